// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::telemetry::setup_simple_tracing;
use crate::{bindings, dev, read, submit};
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use thermo_config::{load_config, AppConfig};
use tracing::{info, instrument, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "thermo")]
#[command(about = "Submit encrypted temperature readings and decrypt your own results", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,

    /// Indicate error levels by adding additional `-v` arguments. Eg. `thermo -vvv` will give you
    /// trace level output
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Silence all output. This argument cannot be used alongside `-v`
    #[arg(
        short,
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        global = true
    )]
    quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,  //
                1 => Level::INFO,  // -v
                2 => Level::DEBUG, // -vv
                _ => Level::TRACE, // -vvv
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn execute(self) -> Result<()> {
        setup_simple_tracing(self.log_level());
        let config = self.load_config()?;
        info!("Config loaded from: {:?}", config.config_file());

        match self.command {
            Commands::Bindings { chain_id } => bindings::execute(&config, chain_id)?,
            Commands::Submit { celsius, chain_id } => {
                submit::execute(&config, chain_id, celsius).await?
            }
            Commands::Read { chain_id } => read::execute(&config, chain_id).await?,
            Commands::Dev { celsius } => dev::execute(&config, celsius).await?,
        }

        Ok(())
    }

    /// A missing default config falls back to the built-in development chain. An explicit
    /// `--config` must exist.
    pub fn load_config(&self) -> Result<AppConfig> {
        match load_config(self.config.as_deref()) {
            Ok(config) => Ok(config),
            Err(e) if self.config.is_none() && is_not_found(&e) => {
                warn!("No configuration file found, using defaults");
                Ok(AppConfig::default())
            }
            Err(e) => Err(e),
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<std::io::Error>(),
            Some(ioe) if ioe.kind() == std::io::ErrorKind::NotFound
        )
    })
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print where the contract is deployed for each configured chain
    Bindings {
        /// Resolve a single chain id, configured or not
        #[arg(long = "chain-id")]
        chain_id: Option<u64>,
    },

    /// Encrypt and submit a reading. The signing key is read from PRIVATE_KEY
    Submit {
        /// Temperature in degrees Celsius, eg. 37.6
        celsius: f64,

        #[arg(long = "chain-id")]
        chain_id: u64,
    },

    /// Read and decrypt your latest reading. The signing key is read from PRIVATE_KEY
    Read {
        #[arg(long = "chain-id")]
        chain_id: u64,
    },

    /// Run a full submit, refresh and decrypt cycle against the in-process development chain
    Dev {
        /// Temperature in degrees Celsius
        #[arg(long, default_value_t = 37.6)]
        celsius: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        let cli = Cli::parse_from(["thermo", "-vv", "bindings"]);
        assert_eq!(cli.log_level(), Level::DEBUG);

        let cli = Cli::parse_from(["thermo", "--quiet", "dev"]);
        assert_eq!(cli.log_level(), Level::ERROR);

        assert!(Cli::try_parse_from(["thermo", "-v", "--quiet", "dev"]).is_err());
    }

    #[test]
    fn test_submit_arguments() {
        let cli = Cli::parse_from(["thermo", "submit", "37.6", "--chain-id", "11155111"]);
        match cli.command {
            Commands::Submit { celsius, chain_id } => {
                assert_eq!(celsius, 37.6);
                assert_eq!(chain_id, 11155111);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_detection() {
        let err = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::NotFound))
            .context("Configuration file not found");
        assert!(is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("Could not parse configuration")));
    }
}
