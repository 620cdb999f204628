#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use color_eyre::Result;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Block, Transaction, TransactionRequest,
};
use ethers_signers::{LocalWallet, Signer};
use ethui_scanner::output::ResultStore;
use ethui_scanner::scan::{BlockSource, FetchError};

pub const CHAIN_ID: u64 = 222;

/// Chain held in memory, `txs_per_block` signed transfers per block, every `match_every`th of
/// them sent to `target`
pub struct SyntheticChain {
    blocks: HashMap<u64, Block<Transaction>>,
}

impl SyntheticChain {
    pub fn new(blocks: u64, txs_per_block: u64, match_every: u64, target: Address) -> Self {
        let wallet: LocalWallet = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
            .parse()
            .unwrap();
        let other = Address::repeat_byte(0xee);

        let blocks = (0..blocks)
            .map(|number| {
                let transactions = (0..txs_per_block)
                    .map(|i| {
                        let nonce = number * txs_per_block + i;
                        let to = if nonce % match_every == 0 { target } else { other };
                        sign(&wallet, to, nonce)
                    })
                    .collect();

                let block = Block {
                    number: Some(number.into()),
                    timestamp: (1_700_000_000 + number * 12).into(),
                    transactions,
                    ..Default::default()
                };
                (number, block)
            })
            .collect();

        Self { blocks }
    }
}

#[async_trait]
impl BlockSource for SyntheticChain {
    async fn block(&self, number: u64) -> Result<Block<Transaction>, FetchError> {
        self.blocks
            .get(&number)
            .cloned()
            .ok_or(FetchError::NotFound(number))
    }
}

/// Discards every row
pub struct NullStore;

impl ResultStore for NullStore {
    fn write_row(&mut self, _fields: &[&str]) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn sign(wallet: &LocalWallet, to: Address, nonce: u64) -> Transaction {
    let typed: TypedTransaction = TransactionRequest::new()
        .nonce(nonce)
        .to(to)
        .gas(21_000u64)
        .gas_price(1_000_000_000u64)
        .value(nonce)
        .chain_id(CHAIN_ID)
        .into();
    let signature = wallet.sign_transaction_sync(&typed).unwrap();

    Transaction {
        hash: typed.hash(&signature),
        nonce: nonce.into(),
        from: wallet.address(),
        to: Some(to),
        value: nonce.into(),
        gas: 21_000u64.into(),
        gas_price: Some(1_000_000_000u64.into()),
        v: signature.v.into(),
        r: signature.r,
        s: signature.s,
        chain_id: Some(CHAIN_ID.into()),
        ..Default::default()
    }
}
