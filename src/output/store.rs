use std::fs::File;
use std::path::Path;

use color_eyre::eyre::{eyre, Result};

use super::ResultStore;

/// CSV file result store
pub struct CsvStore {
    writer: csv::Writer<File>,
}

impl CsvStore {
    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .map_err(|e| eyre!("failed to create {}: {}", path.display(), e))?;

        Ok(Self { writer })
    }
}

impl ResultStore for CsvStore {
    fn write_row(&mut self, fields: &[&str]) -> Result<()> {
        self.writer.write_record(fields)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::output::HEADER;

    #[test]
    fn test_write_and_flush() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("transactions.csv");

        let mut store = CsvStore::create(&path)?;
        store.write_row(&HEADER)?;
        store.write_row(&["0xabc", "0x01", "", "42", "1970-01-01T00:00:00Z"])?;
        store.flush()?;

        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(
            contents,
            "Transaction Hash,From,To,Value,Timestamp\n0xabc,0x01,,42,1970-01-01T00:00:00Z\n"
        );

        Ok(())
    }

    #[test]
    fn test_create_fails_in_missing_directory() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("missing").join("transactions.csv");

        assert!(CsvStore::create(&path).is_err());

        Ok(())
    }
}
