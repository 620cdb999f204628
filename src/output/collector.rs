use color_eyre::eyre::Result;
use tokio::sync::mpsc::Receiver;
use tracing::{info, instrument, trace};

use super::{ResultRow, ResultStore, HEADER};
use crate::scan::TransactionRecord;

/// Writer job
/// Drains the channel shared by all scanners into the result store, in arrival order.
///
/// Stops once the channel is closed and empty, which only happens after every sender (the
/// scanners', and the coordinator's own) has been dropped. Everything received is flushed before
/// returning.
pub struct Collector<S> {
    store: S,
    records: Receiver<TransactionRecord>,
}

impl<S: ResultStore> Collector<S> {
    pub fn new(store: S, records: Receiver<TransactionRecord>) -> Self {
        Self { store, records }
    }

    /// Returns the number of rows written, header excluded
    #[instrument(name = "collector", skip(self))]
    pub async fn run(mut self) -> Result<u64> {
        self.store.write_row(&HEADER)?;

        let mut rows = 0;
        while let Some(record) = self.records.recv().await {
            if record.hash.is_empty() {
                trace!("ignoring empty record");
                continue;
            }

            let row = ResultRow::from(record);
            self.store.write_row(&row.fields())?;
            rows += 1;
        }

        self.store.flush()?;
        info!(rows, "results written");

        Ok(rows)
    }
}
