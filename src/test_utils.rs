//! Shared fixtures for handler tests: a scripted chain reader and ABI value builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, FixedBytes, U256};
use async_trait::async_trait;

use crate::db::MemoryStore;
use crate::rpc::{ChainReader, ContractCall, RpcError};
use crate::transformations::HandlerContext;

#[derive(Clone)]
struct ScriptedResponse {
    from_block: u64,
    /// Exclusive
    to_block: Option<u64>,
    value: Option<DynSolValue>,
}

/// A [`ChainReader`] answering from per-(address, function) scripts.
///
/// Reads with no matching script revert.
#[derive(Default)]
pub struct MockChainReader {
    responses: Mutex<HashMap<([u8; 20], String), Vec<ScriptedResponse>>>,
    calls: AtomicUsize,
    offline: Mutex<bool>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, address: [u8; 20], function: &str, response: ScriptedResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry((address, function.to_string()))
                .or_default()
                .push(response);
        }
    }

    /// Answer `function` on `address` at every block.
    pub fn respond(&self, address: [u8; 20], function: &str, value: DynSolValue) {
        self.respond_between(address, function, 0, None, value);
    }

    /// Answer `function` on `address` for blocks in `[from_block, to_block)`.
    pub fn respond_between(
        &self,
        address: [u8; 20],
        function: &str,
        from_block: u64,
        to_block: Option<u64>,
        value: DynSolValue,
    ) {
        self.script(
            address,
            function,
            ScriptedResponse {
                from_block,
                to_block,
                value: Some(value),
            },
        );
    }

    /// Make `function` on `address` revert at every block.
    pub fn revert(&self, address: [u8; 20], function: &str) {
        self.script(
            address,
            function,
            ScriptedResponse {
                from_block: 0,
                to_block: None,
                value: None,
            },
        );
    }

    /// Simulate an RPC outage: every read fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut flag) = self.offline.lock() {
            *flag = offline;
        }
    }

    /// Number of individual reads served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn call(&self, call: &ContractCall, block_number: u64) -> Result<DynSolValue, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.lock().map(|flag| *flag).unwrap_or(false) {
            return Err(RpcError::Transport("connection refused".to_string()));
        }

        let function = call.function_name().to_string();
        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(&(call.address, function.clone())).cloned())
            .unwrap_or_default();

        scripted
            .into_iter()
            .find(|r| {
                block_number >= r.from_block && r.to_block.map_or(true, |to| block_number < to)
            })
            .and_then(|r| r.value)
            .ok_or_else(|| RpcError::reverted(call.address, &function))
    }
}

/// A context over a fresh in-memory store and the given reader.
pub fn context(reader: Arc<MockChainReader>) -> (HandlerContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = HandlerContext::new("test", 421614, store.clone(), reader);
    (ctx, store)
}

pub fn addr(byte: u8) -> [u8; 20] {
    [byte; 20]
}

pub fn address_value(address: [u8; 20]) -> DynSolValue {
    DynSolValue::Address(Address::from(address))
}

pub fn uint_value(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

pub fn bytes32_name(name: &str) -> DynSolValue {
    let mut word = [0u8; 32];
    word[..name.len()].copy_from_slice(name.as_bytes());
    DynSolValue::FixedBytes(FixedBytes::from(word), 32)
}

/// `getMetadata()(string,string,bytes32)`
pub fn metadata(campaign_type: &str, version: &str, name: &str) -> DynSolValue {
    DynSolValue::Tuple(vec![
        DynSolValue::String(campaign_type.to_string()),
        DynSolValue::String(version.to_string()),
        bytes32_name(name),
    ])
}

/// `getLink()(uint256,address)`
pub fn link(product_id: u64, interaction_contract: [u8; 20]) -> DynSolValue {
    DynSolValue::Tuple(vec![uint_value(product_id), address_value(interaction_contract)])
}

/// Campaign `getConfig()((uint48,uint208),(uint48,uint48),address)`
pub fn campaign_config(bank: [u8; 20]) -> DynSolValue {
    DynSolValue::Tuple(vec![
        DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(1u64), 48),
            DynSolValue::Uint(U256::from(1000u64), 208),
        ]),
        DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::ZERO, 48),
            DynSolValue::Uint(U256::ZERO, 48),
        ]),
        address_value(bank),
    ])
}

/// Bank `getConfig()(uint256,address)`
pub fn bank_config(product_id: u64, token: [u8; 20]) -> DynSolValue {
    DynSolValue::Tuple(vec![uint_value(product_id), address_value(token)])
}

pub fn single(value: DynSolValue) -> DynSolValue {
    DynSolValue::Tuple(vec![value])
}

/// Script a fully readable ERC-20 token.
pub fn script_token(reader: &MockChainReader, token: [u8; 20], symbol: &str, decimals: u8) {
    reader.respond(token, "name", single(DynSolValue::String(format!("{} token", symbol))));
    reader.respond(token, "symbol", single(DynSolValue::String(symbol.to_string())));
    reader.respond(
        token,
        "decimals",
        single(DynSolValue::Uint(U256::from(decimals), 8)),
    );
}

/// Script a campaign whose metadata, link and config are all readable.
pub fn script_campaign(
    reader: &MockChainReader,
    campaign: [u8; 20],
    campaign_type: &str,
    product_id: u64,
    interaction_contract: [u8; 20],
    bank: [u8; 20],
) {
    reader.respond(campaign, "getMetadata", metadata(campaign_type, "0.0.1", "My campaign"));
    reader.respond(campaign, "getLink", link(product_id, interaction_contract));
    reader.respond(campaign, "getConfig", campaign_config(bank));
}
