mod utils;

use std::sync::Arc;

use criterion::*;
use ethers_core::types::Address;
use ethui_scanner::config::Config;
use ethui_scanner::scan::{BlockSource, Coordinator};
use tokio_util::sync::CancellationToken;

use utils::{NullStore, SyntheticChain, CHAIN_ID};

const BLOCKS: u64 = 1000;

/// Scans 1000 in-memory blocks of 10 transactions each, with 1 to 64 scanners
fn scanner_concurrency(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let target = Address::repeat_byte(0xaa);
    let chain: Arc<dyn BlockSource> = Arc::new(SyntheticChain::new(BLOCKS, 10, 7, target));

    let mut group = c.benchmark_group("scanners");
    group.sample_size(10);
    group.throughput(Throughput::Elements(BLOCKS));

    for workers in [1usize, 2, 4, 8, 16, 64].into_iter() {
        let mut config = Config::default();
        config.target = target;
        config.chain.chain_id = CHAIN_ID;
        config.chain.start_block = 0;
        config.chain.end_block = BLOCKS - 1;
        config.scan.workers = workers;

        group.bench_with_input(BenchmarkId::from_parameter(workers), &config, |b, config| {
            b.to_async(&rt).iter(|| async {
                Coordinator::new(config, chain.clone(), CancellationToken::new())
                    .run(NullStore)
                    .await
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, scanner_concurrency);
criterion_main!(benches);
