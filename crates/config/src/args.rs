use clap::Parser;

/// Command line arguments shared by the batch and live ingestion binaries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(long = "conf", default_value = "dotidx.toml")]
    pub conf: String,

    /// Relay chain name (e.g. polkadot, kusama)
    #[arg(long = "relayChain", alias = "relay-chain")]
    pub relay_chain: String,

    /// Chain name within the relay (e.g. polkadot, assethub)
    #[arg(long = "chain")]
    pub chain: String,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
