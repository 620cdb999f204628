#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use color_eyre::Result;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Block, Eip1559TransactionRequest,
    Transaction, TransactionRequest, H256, U256, U64,
};
use ethers_signers::{LocalWallet, Signer};
use tracing::subscriber::DefaultGuard;

use crate::output::ResultStore;
use crate::scan::{BlockSource, FetchError};

pub const CHAIN_ID: u64 = 222;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const GAS_PRICE: u64 = 1_000_000_000;

#[rstest::fixture]
pub fn alice() -> LocalWallet {
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        .parse()
        .unwrap()
}

#[rstest::fixture]
pub fn bob() -> LocalWallet {
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
        .parse()
        .unwrap()
}

/// A legacy, EIP-155 signed transaction, as a node would return it
pub fn signed_tx(
    wallet: &LocalWallet,
    chain_id: u64,
    to: Option<Address>,
    value: u64,
    nonce: u64,
) -> Transaction {
    let mut request = TransactionRequest::new()
        .nonce(nonce)
        .gas(21_000u64)
        .gas_price(GAS_PRICE)
        .value(value)
        .chain_id(chain_id);
    if let Some(to) = to {
        request = request.to(to);
    }

    let typed: TypedTransaction = request.into();
    let signature = wallet.sign_transaction_sync(&typed).unwrap();

    Transaction {
        hash: typed.hash(&signature),
        nonce: nonce.into(),
        from: wallet.address(),
        to,
        value: value.into(),
        gas: 21_000u64.into(),
        gas_price: Some(GAS_PRICE.into()),
        v: signature.v.into(),
        r: signature.r,
        s: signature.s,
        chain_id: Some(chain_id.into()),
        ..Default::default()
    }
}

/// A legacy transaction signed without replay protection (`v` is 27 or 28)
pub fn unprotected_tx(
    wallet: &LocalWallet,
    to: Option<Address>,
    value: u64,
    nonce: u64,
) -> Transaction {
    let mut request = TransactionRequest::new()
        .nonce(nonce)
        .gas(21_000u64)
        .gas_price(GAS_PRICE)
        .value(value);
    if let Some(to) = to {
        request = request.to(to);
    }

    // signing the hash directly, `sign_transaction_sync` would add the wallet's chain id
    let typed: TypedTransaction = request.into();
    let signature = wallet.sign_hash(typed.sighash()).unwrap();

    Transaction {
        hash: typed.hash(&signature),
        nonce: nonce.into(),
        from: wallet.address(),
        to,
        value: value.into(),
        gas: 21_000u64.into(),
        gas_price: Some(GAS_PRICE.into()),
        v: signature.v.into(),
        r: signature.r,
        s: signature.s,
        ..Default::default()
    }
}

/// An EIP-1559 signed transaction, as a node would return it
pub fn signed_eip1559_tx(
    wallet: &LocalWallet,
    chain_id: u64,
    to: Option<Address>,
    value: u64,
    nonce: u64,
) -> Transaction {
    let mut request = Eip1559TransactionRequest::new()
        .nonce(nonce)
        .gas(21_000u64)
        .max_fee_per_gas(2 * GAS_PRICE)
        .max_priority_fee_per_gas(GAS_PRICE)
        .value(value)
        .chain_id(chain_id);
    if let Some(to) = to {
        request = request.to(to);
    }

    let typed: TypedTransaction = request.into();
    let signature = wallet.sign_transaction_sync(&typed).unwrap();

    Transaction {
        hash: typed.hash(&signature),
        nonce: nonce.into(),
        from: wallet.address(),
        to,
        value: value.into(),
        gas: 21_000u64.into(),
        max_fee_per_gas: Some((2 * GAS_PRICE).into()),
        max_priority_fee_per_gas: Some(GAS_PRICE.into()),
        access_list: Some(Default::default()),
        transaction_type: Some(U64::from(2u64)),
        v: signature.v.into(),
        r: signature.r,
        s: signature.s,
        chain_id: Some(chain_id.into()),
        ..Default::default()
    }
}

/// A transaction with an all-zero signature, from which no sender can be recovered
pub fn unsigned_tx(to: Option<Address>, value: u64) -> Transaction {
    Transaction {
        hash: H256::from_low_u64_be(value),
        to,
        value: value.into(),
        gas: 21_000u64.into(),
        gas_price: Some(GAS_PRICE.into()),
        v: 27u64.into(),
        r: U256::zero(),
        s: U256::zero(),
        ..Default::default()
    }
}

/// In-memory chain
///
/// Holds empty blocks for a range of numbers, with one block every 12 seconds. Individual blocks
/// can be given transactions, or made to fail on fetch. Every fetch is recorded.
#[derive(Debug, Default)]
pub struct FakeChain {
    blocks: HashMap<u64, Block<Transaction>>,
    failing: HashSet<u64>,
    fetched: Mutex<Vec<u64>>,
}

impl FakeChain {
    pub fn new(numbers: RangeInclusive<u64>) -> Self {
        let blocks = numbers
            .map(|number| {
                let block = Block {
                    number: Some(number.into()),
                    timestamp: Self::timestamp_of(number).into(),
                    ..Default::default()
                };
                (number, block)
            })
            .collect();

        Self {
            blocks,
            ..Default::default()
        }
    }

    pub fn set_transactions(&mut self, number: u64, txs: Vec<Transaction>) {
        if let Some(block) = self.blocks.get_mut(&number) {
            block.transactions = txs;
        }
    }

    pub fn fail(&mut self, number: u64) {
        self.failing.insert(number);
    }

    pub fn timestamp(&self, number: u64) -> u64 {
        Self::timestamp_of(number)
    }

    /// Block numbers fetched so far, sorted
    pub fn fetched(&self) -> Vec<u64> {
        let mut fetched = self.fetched.lock().unwrap().clone();
        fetched.sort();
        fetched
    }

    fn timestamp_of(number: u64) -> u64 {
        GENESIS_TIMESTAMP + number * 12
    }
}

#[async_trait]
impl BlockSource for FakeChain {
    async fn block(&self, number: u64) -> Result<Block<Transaction>, FetchError> {
        self.fetched.lock().unwrap().push(number);

        if self.failing.contains(&number) {
            return Err(FetchError::Network("connection reset by peer".to_owned()));
        }

        self.blocks
            .get(&number)
            .cloned()
            .ok_or(FetchError::NotFound(number))
    }
}

/// Result store keeping rows in memory
///
/// Clones share the same rows, so a test can keep one and hand the other to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<Vec<String>>>>,
    flushed: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    /// Number of rows written as of the last flush
    pub fn flushed(&self) -> usize {
        *self.flushed.lock().unwrap()
    }
}

impl ResultStore for MemoryStore {
    fn write_row(&mut self, fields: &[&str]) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .push(fields.iter().map(|f| f.to_string()).collect());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        *self.flushed.lock().unwrap() = self.rows.lock().unwrap().len();
        Ok(())
    }
}

/// Formatted log output, kept in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes events from the current thread into this capture until the guard is dropped
    pub fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Lines logged at `level` containing every one of `parts`
    pub fn matching(&self, level: &str, parts: &[&str]) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.contains(level) && parts.iter().all(|p| l.contains(p)))
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
