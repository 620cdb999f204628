use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use ethers_core::types::{Address, Block, Transaction};
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use super::provider::{BlockSource, SigningRule};
use super::{matches, BlockRange, ScanJob, ScanStats, TransactionRecord};

/// Everything a scanner needs besides its own range and sink
///
/// Built once per run by the coordinator and cloned into every scanner. All of it is read-only,
/// except for the cancellation token.
#[derive(Clone)]
pub struct ScanContext {
    /// Address to search for
    pub target: Address,

    pub source: Arc<dyn BlockSource>,
    pub signer: SigningRule,

    /// Cancellation token for aborting the run
    pub cancellation_token: CancellationToken,
}

/// Scan job for a single block range
///
/// Walks its range forward, one block at a time, and sends every transaction sent by or to the
/// target address down the sink. Blocks that can't be fetched and transactions whose sender
/// can't be recovered are logged, counted and skipped.
pub struct Scanner {
    id: usize,
    range: BlockRange,
    ctx: ScanContext,
    sink: Sender<TransactionRecord>,
    stats: ScanStats,
}

#[async_trait]
impl ScanJob for Scanner {
    #[instrument(name = "scanner", skip(self), fields(id = self.id, range = %self.range))]
    async fn run(mut self) -> Result<ScanStats> {
        for number in self.range.blocks() {
            let block = select! {
                biased;
                _ = self.ctx.cancellation_token.cancelled() => break,
                block = self.ctx.source.block(number) => block,
            };

            let block = match block {
                Ok(block) => block,
                Err(e) => {
                    warn!(block = number, error = %e, "skipping block");
                    self.stats.skipped_blocks += 1;
                    continue;
                }
            };

            self.stats.blocks += 1;
            if !self.process_block(number, block).await? {
                break;
            }
        }

        debug!(stats = ?self.stats, "finished");
        Ok(self.stats)
    }
}

impl Scanner {
    pub fn new(
        id: usize,
        range: BlockRange,
        ctx: ScanContext,
        sink: Sender<TransactionRecord>,
    ) -> Self {
        Self {
            id,
            range,
            ctx,
            sink,
            stats: Default::default(),
        }
    }

    /// Returns `false` if the run was cancelled while waiting on the sink
    async fn process_block(&mut self, number: u64, block: Block<Transaction>) -> Result<bool> {
        let timestamp = block.timestamp.low_u64();

        for tx in block.transactions {
            self.stats.transactions += 1;

            let from = match self.ctx.signer.recover(&tx) {
                Ok(from) => from,
                Err(e) => {
                    warn!(block = number, tx = ?tx.hash, error = %e, "skipping transaction");
                    self.stats.skipped_transactions += 1;
                    continue;
                }
            };

            if !matches(&self.ctx.target, &from, tx.to.as_ref()) {
                continue;
            }

            let record = TransactionRecord::new(&tx, from, timestamp);
            trace!(block = number, hash = %record.hash, "match");

            // blocks while the channel is full
            select! {
                biased;
                _ = self.ctx.cancellation_token.cancelled() => return Ok(false),
                sent = self.sink.send(record) => {
                    sent.map_err(|_| eyre!("writer stopped before scanner {} finished", self.id))?
                }
            }

            self.stats.matches += 1;
        }

        Ok(true)
    }
}
