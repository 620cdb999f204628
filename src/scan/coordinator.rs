use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, instrument, warn};

use super::worker::ScanContext;
use super::{partition, BlockSource, ScanJob, ScanStats, Scanner, SigningRule};
use crate::config::Config;
use crate::output::{Collector, ResultStore};

/// Runs a whole scan
///
/// Partitions the configured block range, runs one scanner per partition and a single collector
/// draining their shared channel into the result store.
///
/// Shutdown ordering: the collector only stops once the channel is closed, and the channel only
/// closes once every scanner has terminated and the coordinator has dropped its own sender. So
/// every record a scanner managed to send ends up in the store, flushed.
pub struct Coordinator {
    start_block: u64,
    end_block: u64,
    workers: usize,
    buffer_size: usize,
    ctx: ScanContext,
}

impl Coordinator {
    pub fn new(
        config: &Config,
        source: Arc<dyn BlockSource>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            start_block: config.chain.start_block,
            end_block: config.chain.end_block,
            workers: config.scan.workers,
            buffer_size: config.scan.buffer_size,
            ctx: ScanContext {
                target: config.target,
                source,
                signer: SigningRule::for_chain(config.chain.chain_id),
                cancellation_token,
            },
        }
    }

    #[instrument(
        name = "coordinator",
        skip_all,
        fields(start = self.start_block, end = self.end_block)
    )]
    pub async fn run<S>(self, store: S) -> Result<ScanStats>
    where
        S: ResultStore + 'static,
    {
        let ranges = partition(self.start_block, self.end_block, self.workers);
        info!(
            workers = ranges.len(),
            target = ?self.ctx.target,
            "starting scan"
        );

        let (records_tx, records_rx) = mpsc::channel(self.buffer_size.max(1));
        let collector = tokio::spawn(Collector::new(store, records_rx).run());

        let tracker = TaskTracker::new();
        let scanners: Vec<_> = ranges
            .into_iter()
            .enumerate()
            .map(|(id, range)| {
                let scanner = Scanner::new(id, range, self.ctx.clone(), records_tx.clone());
                tracker.spawn(scanner.run())
            })
            .collect();

        // every scanner must have terminated before the channel is allowed to close
        tracker.close();
        tracker.wait().await;
        drop(records_tx);

        let mut stats = ScanStats::default();
        let mut failure = None;
        for (id, result) in join_all(scanners).await.into_iter().enumerate() {
            match result {
                Ok(Ok(s)) => stats += s,
                Ok(Err(e)) => {
                    warn!(scanner = id, error = %e, "scanner failed");
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    warn!(scanner = id, error = %e, "scanner panicked");
                    failure.get_or_insert(eyre!("scanner {} panicked: {}", id, e));
                }
            }
        }

        // drains whatever is left in the channel, then flushes.
        // a scanner failing to send means the collector is gone, so its error takes precedence
        let rows = collector.await??;

        if let Some(e) = failure {
            return Err(e);
        }

        if self.ctx.cancellation_token.is_cancelled() {
            warn!(rows, "scan cancelled, results only cover part of the range");
        }

        if stats.is_partial() {
            warn!(
                skipped_blocks = stats.skipped_blocks,
                skipped_transactions = stats.skipped_transactions,
                "some blocks or transactions were skipped, results are incomplete"
            );
        }

        info!(
            blocks = stats.blocks,
            transactions = stats.transactions,
            matches = stats.matches,
            rows,
            "scan finished"
        );

        Ok(stats)
    }
}
