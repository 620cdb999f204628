mod coordinator;
mod partition;
mod provider;
mod worker;

use std::ops::AddAssign;

use async_trait::async_trait;
use color_eyre::eyre::Result;
use ethers_core::types::{Address, Transaction};
use ethers_core::utils::to_checksum;

pub use coordinator::Coordinator;
pub use partition::{partition, BlockRange};
pub use provider::{BlockSource, FetchError, RecoveryError, RpcProvider, SigningRule};
pub use worker::{ScanContext, Scanner};

/// A transaction that involves the target address
///
/// Produced by a scanner and moved through the channel to the writer. Never mutated after being
/// sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,

    /// Empty for contract creations
    pub to: String,

    /// Transferred amount, in wei
    pub value: String,

    pub block_timestamp: u64,
}

impl TransactionRecord {
    pub fn new(tx: &Transaction, from: Address, block_timestamp: u64) -> Self {
        Self {
            hash: format!("{:?}", tx.hash),
            from: to_checksum(&from, None),
            to: tx.to.map(|to| to_checksum(&to, None)).unwrap_or_default(),
            value: tx.value.to_string(),
            block_timestamp,
        }
    }
}

/// Whether a transaction sent by `from` to `to` involves `target`
pub fn matches(target: &Address, from: &Address, to: Option<&Address>) -> bool {
    from == target || to == Some(target)
}

/// Counters for a single scanner, or for a whole run once merged
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub blocks: u64,
    pub transactions: u64,
    pub matches: u64,
    pub skipped_blocks: u64,
    pub skipped_transactions: u64,
}

impl ScanStats {
    /// Whether any block or transaction was left out of the result
    pub fn is_partial(&self) -> bool {
        self.skipped_blocks > 0 || self.skipped_transactions > 0
    }
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.blocks += other.blocks;
        self.transactions += other.transactions;
        self.matches += other.matches;
        self.skipped_blocks += other.skipped_blocks;
        self.skipped_transactions += other.skipped_transactions;
    }
}

#[async_trait]
pub trait ScanJob {
    async fn run(self) -> Result<ScanStats>;
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ethers_core::types::{H256, U256};
    use rstest::rstest;

    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte; 20])
    }

    #[rstest]
    #[case(addr(1), Some(addr(2)), true)]
    #[case(addr(2), Some(addr(1)), true)]
    #[case(addr(1), None, true)]
    #[case(addr(2), None, false)]
    #[case(addr(2), Some(addr(3)), false)]
    fn test_matches(#[case] from: Address, #[case] to: Option<Address>, #[case] expected: bool) {
        let target = addr(1);

        assert_eq!(matches(&target, &from, to.as_ref()), expected);
        // evaluating again on the same transaction gives the same answer
        assert_eq!(matches(&target, &from, to.as_ref()), expected);
    }

    #[test]
    fn test_record_from_transaction() {
        let from = Address::from_str("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        let tx = Transaction {
            hash: H256::from_low_u64_be(0xabc),
            to: Some(addr(0xaa)),
            value: U256::exp10(18),
            ..Default::default()
        };

        let record = TransactionRecord::new(&tx, from, 1_700_000_000);

        assert_eq!(
            record.hash,
            "0x0000000000000000000000000000000000000000000000000000000000000abc"
        );
        assert_eq!(record.from, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(record.to.to_lowercase(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(record.value, "1000000000000000000");
        assert_eq!(record.block_timestamp, 1_700_000_000);
    }

    #[test]
    fn test_record_contract_creation() {
        let tx = Transaction {
            to: None,
            ..Default::default()
        };

        let record = TransactionRecord::new(&tx, addr(1), 0);

        assert_eq!(record.to, "");
        assert_eq!(record.value, "0");
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ScanStats::default();
        total += ScanStats {
            blocks: 5,
            transactions: 10,
            matches: 1,
            skipped_blocks: 0,
            skipped_transactions: 0,
        };
        assert!(!total.is_partial());

        total += ScanStats {
            blocks: 5,
            transactions: 7,
            matches: 2,
            skipped_blocks: 1,
            skipped_transactions: 0,
        };

        assert_eq!(total.blocks, 10);
        assert_eq!(total.transactions, 17);
        assert_eq!(total.matches, 3);
        assert!(total.is_partial());
    }
}
