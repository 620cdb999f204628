use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use color_eyre::eyre::{bail, eyre, Result};
use ethers_core::types::Address;
use serde::Deserialize;
use tracing::debug;
use url::Url;

const DEFAULT_CONFIG: &str = "ethui-scanner.toml";

#[derive(Debug, clap::Parser)]
struct Args {
    /// Address to search for, as hex
    address: String,

    #[clap(long, default_value = DEFAULT_CONFIG, env = "ETHUI_SCANNER_CONFIG")]
    config: PathBuf,

    /// JSON-RPC endpoint of the node
    #[clap(long)]
    endpoint: Option<Url>,

    #[clap(long)]
    chain_id: Option<u64>,

    #[clap(long)]
    start_block: Option<u64>,

    #[clap(long)]
    end_block: Option<u64>,

    /// Number of parallel scanners
    #[clap(long)]
    workers: Option<usize>,

    /// Capacity of the channel between scanners and the writer
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Path of the CSV file to write
    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    /// Address being searched for. Only ever set from the command line
    #[serde(skip)]
    pub target: Address,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RpcConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_start_block")]
    pub start_block: u64,

    #[serde(default = "default_end_block")]
    pub end_block: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScanConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Config {
    pub fn read() -> Result<Self> {
        let args = Args::parse();

        let mut config = if args.config.exists() {
            Self::read_from(args.config.as_path())?
        } else if args.config == Path::new(DEFAULT_CONFIG) {
            debug!("no config file found, using defaults");
            Self::default()
        } else {
            bail!("config file {} not found", args.config.display());
        };

        config.target = parse_address(&args.address)?;
        config.apply(args);
        config.validate()?;

        Ok(config)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Rejects settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scan.workers == 0 {
            bail!("at least one worker is required");
        }

        if self.scan.buffer_size == 0 {
            bail!("buffer_size must be greater than zero");
        }

        if self.chain.start_block > self.chain.end_block {
            bail!(
                "start_block ({}) is after end_block ({})",
                self.chain.start_block,
                self.chain.end_block
            );
        }

        Ok(())
    }

    // command line flags take precedence over the config file
    fn apply(&mut self, args: Args) {
        if let Some(endpoint) = args.endpoint {
            self.rpc.endpoint = endpoint;
        }
        if let Some(chain_id) = args.chain_id {
            self.chain.chain_id = chain_id;
        }
        if let Some(start_block) = args.start_block {
            self.chain.start_block = start_block;
        }
        if let Some(end_block) = args.end_block {
            self.chain.end_block = end_block;
        }
        if let Some(workers) = args.workers {
            self.scan.workers = workers;
        }
        if let Some(buffer_size) = args.buffer_size {
            self.scan.buffer_size = buffer_size;
        }
        if let Some(output) = args.output {
            self.output.path = output;
        }
    }
}

pub fn parse_address(s: &str) -> Result<Address> {
    let s = s.trim();
    let hex = s.strip_prefix("0x").unwrap_or(s);

    if hex.len() != 40 {
        bail!("invalid address {}: expected 20 bytes of hex", s);
    }

    Address::from_str(hex).map_err(|e| eyre!("invalid address {}: {}", s, e))
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            start_block: default_start_block(),
            end_block: default_end_block(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse("http://127.0.0.1:8545").expect("static url is valid")
}

fn default_chain_id() -> u64 {
    222
}

fn default_start_block() -> u64 {
    0
}

fn default_end_block() -> u64 {
    6000
}

fn default_workers() -> usize {
    10
}

fn default_buffer_size() -> usize {
    1000
}

fn default_output_path() -> PathBuf {
    PathBuf::from("transactions.csv")
}
