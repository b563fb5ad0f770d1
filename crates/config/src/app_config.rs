// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::chain_config::{ChainConfig, MockChainConfig};
use crate::load_config::{find_in_parent, resolve_config_path};
use crate::yaml::{expand_env, load_yaml_with_env};
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{env, path::PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_NAME: &str = "thermo.config.yaml";
pub const ENV_PREFIX: &str = "THERMO_";

/// Parameters of the decryption authorizations the client asks the wallet to sign.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DecryptionConfig {
    /// How many days a signed authorization stays valid
    pub duration_days: u64,
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self { duration_days: 365 }
    }
}

/// The config actually used throughout the app
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Live networks with a deployment
    chains: Vec<ChainConfig>,
    /// Development chains simulated in-process
    mock_chains: Vec<MockChainConfig>,
    /// Decryption authorization parameters
    decryption: DecryptionConfig,
    /// Where this configuration was read from, if anywhere
    found_config_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chains: vec![],
            mock_chains: vec![MockChainConfig::default()],
            decryption: DecryptionConfig::default(),
            found_config_file: None,
        }
    }
}

impl AppConfig {
    /// Parse configuration from a yaml string layered over the defaults and `THERMO_` variables.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let expanded = expand_env(yaml)?;
        Self::extract(Figment::new().merge(Yaml::string(&expanded)))
    }

    fn extract(layer: Figment) -> Result<Self> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(layer)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Could not parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                bail!("Chain id {} is configured more than once", chain.chain_id);
            }
            chain.rpc_url()?;
            chain.relayer_url()?;
            chain.contracts.temperature_check.address()?;
        }
        for mock in &self.mock_chains {
            if !seen.insert(mock.chain_id) {
                bail!(
                    "Chain id {} is configured both as a mock chain and a live chain",
                    mock.chain_id
                );
            }
        }
        if self.decryption.duration_days == 0 {
            bail!("decryption.duration_days must be at least 1");
        }
        Ok(())
    }

    /// Enabled live chains
    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.iter().filter(|c| c.is_enabled())
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains().find(|c| c.chain_id == chain_id)
    }

    pub fn mock_chains(&self) -> &[MockChainConfig] {
        &self.mock_chains
    }

    pub fn mock_chain(&self, chain_id: u64) -> Option<&MockChainConfig> {
        self.mock_chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn decryption(&self) -> &DecryptionConfig {
        &self.decryption
    }

    pub fn config_file(&self) -> Option<&PathBuf> {
        self.found_config_file.as_ref()
    }
}

/// Locate and load the configuration file. `cli_file` is the value of `--config`.
pub fn load_config(cli_file: Option<&str>) -> Result<AppConfig> {
    let cli_file = cli_file.map(PathBuf::from);
    let cwd = env::current_dir()?;
    let resolved = resolve_config_path(
        find_in_parent,
        &cwd,
        &OsDirs::config_dir(),
        DEFAULT_CONFIG_NAME,
        cli_file.as_deref(),
    );
    debug!(path = %resolved.display(), "Loading configuration");

    let loaded_yaml = load_yaml_with_env(&resolved).context("Configuration file not found")?;
    let mut config = AppConfig::extract(Figment::new().merge(Yaml::string(&loaded_yaml)))?;
    config.found_config_file = Some(resolved);
    Ok(config)
}

pub struct OsDirs;

impl OsDirs {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("thermo")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_config::{DEFAULT_MOCK_CONTRACT, HARDHAT_CHAIN_ID};
    use crate::rpc::RpcAuth;
    use alloy_primitives::address;
    use figment::Jail;

    const CONFIG: &str = r#"
chains:
  - name: "sepolia"
    chain_id: 11155111
    rpc_url: "wss://sepolia.example.org/ws"
    rpc_auth:
      type: "Bearer"
      credentials: "${THERMO_TEST_TOKEN}"
    contracts:
      temperature_check:
        address: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"
        deploy_block: 7100000
    relayer_url: "https://relayer.example.org"
    decryption_verifier: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1"
  - name: "disabled"
    enabled: false
    chain_id: 10
    rpc_url: "https://optimism.example.org"
    contracts:
      temperature_check: "0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9"
mock_chains:
  - chain_id: 31337
  - chain_id: 1337
    name: "anvil"
    temperature_check: "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9"
"#;

    #[test]
    fn test_deserialization() {
        Jail::expect_with(|jail| {
            jail.set_env("THERMO_TEST_TOKEN", "secret-token");
            jail.create_file(DEFAULT_CONFIG_NAME, CONFIG)?;

            let config = load_config(None).map_err(|e| e.to_string())?;

            let chains: Vec<_> = config.chains().collect();
            assert_eq!(chains.len(), 1);
            let sepolia = chains[0];
            assert_eq!(sepolia.chain_id, 11155111);
            assert_eq!(sepolia.rpc_auth, RpcAuth::Bearer("secret-token".into()));
            assert_eq!(
                sepolia.contracts.temperature_check.deploy_block(),
                Some(7100000)
            );
            assert!(config.chain(10).is_none());

            let hardhat = config.mock_chain(HARDHAT_CHAIN_ID).ok_or("no hardhat")?;
            assert_eq!(hardhat.contract_address(), DEFAULT_MOCK_CONTRACT);
            let anvil = config.mock_chain(1337).ok_or("no anvil")?;
            assert_eq!(
                anvil.contract_address(),
                address!("0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9")
            );
            assert_eq!(config.decryption().duration_days, 365);
            assert!(config.config_file().is_some());
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.set_env("THERMO_DECRYPTION__DURATION_DAYS", "7");
            let config = AppConfig::from_yaml_str("chains: []").map_err(|e| e.to_string())?;
            assert_eq!(config.decryption().duration_days, 7);
            assert_eq!(config.mock_chains().len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_duplicate_chain_ids() {
        let yaml = r#"
chains:
  - name: "local"
    chain_id: 31337
    rpc_url: "http://localhost:8545"
    contracts:
      temperature_check: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#;
        let err = AppConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("31337"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        Jail::expect_with(|_| {
            let err = load_config(Some("nope.yaml")).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<std::io::Error>(),
                Some(e) if e.kind() == std::io::ErrorKind::NotFound
            ));
            Ok(())
        });
    }
}
