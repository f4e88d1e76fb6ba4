use std::str::FromStr;

use alloy::primitives::Address;
use anyhow::Context;
use serde::Deserialize;

use crate::rpc::MULTICALL3_ADDRESS;

fn default_multicall_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct ChainConfigRaw {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    #[serde(default)]
    pub multicall_address: Option<String>,
    #[serde(default = "default_multicall_batch_size")]
    pub multicall_batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    pub multicall_address: [u8; 20],
    pub multicall_batch_size: usize,
}

pub fn resolve_chain_config(raw_config: ChainConfigRaw) -> anyhow::Result<ChainConfig> {
    let multicall_address: [u8; 20] = match raw_config.multicall_address.as_deref() {
        Some(address) => Address::from_str(address)
            .with_context(|| {
                format!(
                    "Invalid multicall_address '{}' for chain {}",
                    address, raw_config.name
                )
            })?
            .into(),
        None => MULTICALL3_ADDRESS,
    };

    if raw_config.multicall_batch_size == 0 {
        anyhow::bail!(
            "multicall_batch_size must be positive for chain {}",
            raw_config.name
        );
    }

    Ok(ChainConfig {
        name: raw_config.name,
        chain_id: raw_config.chain_id,
        rpc_url_env_var: raw_config.rpc_url_env_var,
        multicall_address,
        multicall_batch_size: raw_config.multicall_batch_size,
    })
}
