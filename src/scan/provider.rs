use std::borrow::Cow;

use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use ethers_core::types::{Address, Block, SignatureError, Transaction, U256};
use ethers_providers::{Http, Middleware, Provider};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("block {0} not found")]
    NotFound(u64),

    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("transaction signed for chain {found}, expected {expected}")]
    ChainMismatch { expected: u64, found: U256 },
}

/// Source of full blocks, transactions included
///
/// The scanners only ever go through this trait, so tests can swap the node for an in-memory
/// chain.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn block(&self, number: u64) -> Result<Block<Transaction>, FetchError>;
}

/// JSON-RPC node access
#[derive(Debug, Clone)]
pub struct RpcProvider {
    provider: Provider<Http>,
}

impl RpcProvider {
    /// Connects to the node at `endpoint`
    ///
    /// Fails if the node does not answer. A node reporting a different chain id than the
    /// configured one is only warned about.
    pub async fn connect(endpoint: &Url, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(endpoint.as_str())?;

        let latest = provider
            .get_block_number()
            .await
            .map_err(|e| eyre!("failed to connect to {}: {}", endpoint, e))?;

        let remote_chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| eyre!("failed to read chain id from {}: {}", endpoint, e))?;

        if remote_chain_id != U256::from(chain_id) {
            warn!(
                configured = chain_id,
                remote = %remote_chain_id,
                "node reports a different chain id"
            );
        }

        info!(%endpoint, latest = latest.as_u64(), "connected");

        Ok(Self { provider })
    }
}

#[async_trait]
impl BlockSource for RpcProvider {
    async fn block(&self, number: u64) -> Result<Block<Transaction>, FetchError> {
        self.provider
            .get_block_with_txs(number)
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
            .ok_or(FetchError::NotFound(number))
    }
}

/// Sender recovery rules for a single chain
///
/// Accepts legacy (with or without EIP-155 replay protection) and typed transactions, as long as
/// they were signed for this chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningRule {
    chain_id: u64,
}

impl SigningRule {
    pub fn for_chain(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn recover(&self, tx: &Transaction) -> Result<Address, RecoveryError> {
        let legacy = tx.transaction_type.map_or(true, |t| t.is_zero());

        let tx = if !legacy {
            if let Some(found) = tx.chain_id {
                self.check(found)?;
            }
            Cow::Borrowed(tx)
        } else {
            // the signing hash of a legacy transaction only includes a chain id when `v` says
            // so, whatever chainId the node reports alongside it
            match eip155_chain_id(tx) {
                Some(found) => {
                    self.check(found.into())?;
                    with_chain_id(tx, Some(found.into()))
                }

                // pre EIP-155
                None => with_chain_id(tx, None),
            }
        };

        Ok(tx.recover_from()?)
    }

    fn check(&self, found: U256) -> Result<(), RecoveryError> {
        if found != U256::from(self.chain_id) {
            return Err(RecoveryError::ChainMismatch {
                expected: self.chain_id,
                found,
            });
        }

        Ok(())
    }
}

fn with_chain_id(tx: &Transaction, chain_id: Option<U256>) -> Cow<'_, Transaction> {
    if tx.chain_id == chain_id {
        return Cow::Borrowed(tx);
    }

    let mut tx = tx.clone();
    tx.chain_id = chain_id;
    Cow::Owned(tx)
}

/// Chain id encoded in the `v` value of a replay-protected legacy transaction
fn eip155_chain_id(tx: &Transaction) -> Option<u64> {
    let legacy = tx.transaction_type.map_or(true, |t| t.is_zero());
    let v = tx.v.as_u64();

    if legacy && v >= 35 {
        Some((v - 35) / 2)
    } else {
        None
    }
}
