use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::config::chain::{resolve_chain_config, ChainConfig, ChainConfigRaw};

fn default_database_url_env_var() -> String {
    "DATABASE_URL".to_string()
}

#[derive(Debug, Deserialize)]
pub struct IndexerConfigRaw {
    #[serde(default = "default_database_url_env_var")]
    pub database_url_env_var: String,
    pub chains: Vec<ChainConfigRaw>,
}

#[derive(Debug)]
pub struct IndexerConfig {
    /// Env var holding the PostgreSQL URL. When unset the in-memory store is used.
    pub database_url_env_var: String,
    pub chains: Vec<ChainConfig>,
}

impl IndexerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let raw_config: IndexerConfigRaw = serde_json::from_str(content)?;

        let chains = raw_config
            .chains
            .into_iter()
            .map(resolve_chain_config)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(IndexerConfig {
            database_url_env_var: raw_config.database_url_env_var,
            chains,
        })
    }

    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MULTICALL3_ADDRESS;

    #[test]
    fn test_defaults_applied() {
        let config = IndexerConfig::from_json(
            r#"{"chains": [{"name": "arbitrum-sepolia", "chain_id": 421614, "rpc_url_env_var": "ARB_SEPOLIA_RPC_URL"}]}"#,
        )
        .unwrap();

        assert_eq!(config.database_url_env_var, "DATABASE_URL");
        let chain = config.chain("arbitrum-sepolia").unwrap();
        assert_eq!(chain.multicall_address, MULTICALL3_ADDRESS);
        assert_eq!(chain.multicall_batch_size, 100);
    }

    #[test]
    fn test_explicit_multicall_address() {
        let config = IndexerConfig::from_json(
            r#"{
                "database_url_env_var": "PONDER_DATABASE_URL",
                "chains": [{
                    "name": "local",
                    "chain_id": 31337,
                    "rpc_url_env_var": "LOCAL_RPC_URL",
                    "multicall_address": "0x0000000000000000000000000000000000000042",
                    "multicall_batch_size": 10
                }]
            }"#,
        )
        .unwrap();

        let chain = &config.chains[0];
        assert_eq!(chain.multicall_address[19], 0x42);
        assert_eq!(chain.multicall_batch_size, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(IndexerConfig::from_json(
            r#"{"chains": [{"name": "x", "chain_id": 1, "rpc_url_env_var": "X", "multicall_address": "nope"}]}"#
        )
        .is_err());
        assert!(IndexerConfig::from_json(
            r#"{"chains": [{"name": "x", "chain_id": 1, "rpc_url_env_var": "X", "multicall_batch_size": 0}]}"#
        )
        .is_err());
    }
}
