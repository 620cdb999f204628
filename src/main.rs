use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::Result;
use tokio::{select, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use ethui_scanner::config::Config;
use ethui_scanner::output::CsvStore;
use ethui_scanner::scan::{Coordinator, RpcProvider};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = Config::read()?;
    let started = Instant::now();

    // both are fatal, and must fail before any scanner starts
    let provider = RpcProvider::connect(&config.rpc.endpoint, config.chain.chain_id).await?;
    let store = CsvStore::create(&config.output.path)?;

    let token = CancellationToken::new();
    let coordinator = Coordinator::new(&config, Arc::new(provider), token.clone());
    let mut run = tokio::spawn(coordinator.run(store));

    // termination handling
    let stats = select! {
        res = &mut run => res??,
        _ = signal::ctrl_c() => {
            warn!("interrupted, stopping scanners");
            token.cancel();
            run.await??
        }
    };

    info!(
        output = %config.output.path.display(),
        matches = stats.matches,
        "done"
    );
    println!("Execution Time: {:?}", started.elapsed());

    Ok(())
}

fn setup() -> Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NEW)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
