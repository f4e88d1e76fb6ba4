//! Handler context and decoded data types.
//!
//! The HandlerContext gives handlers access to the entity store and to
//! block-pinned contract reads.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{I256, U256};

use super::error::TransformationError;
use crate::db::EntityStore;
use crate::rpc::{ChainReader, ContractCall, RpcError};

/// A decoded value from an event parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Address([u8; 20]),
    Uint256(U256),
    Int256(I256),
    Uint64(u64),
    Uint8(u8),
    Bool(bool),
    Bytes32([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
}

impl DecodedValue {
    /// Try to get as an address.
    pub fn as_address(&self) -> Option<[u8; 20]> {
        match self {
            DecodedValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Try to get as bytes32.
    pub fn as_bytes32(&self) -> Option<[u8; 32]> {
        match self {
            DecodedValue::Bytes32(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as U256.
    pub fn as_uint256(&self) -> Option<U256> {
        match self {
            DecodedValue::Uint256(v) => Some(*v),
            DecodedValue::Uint64(v) => Some(U256::from(*v)),
            DecodedValue::Uint8(v) => Some(U256::from(*v)),
            DecodedValue::String(s) => U256::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DecodedValue::Uint64(v) => Some(*v),
            DecodedValue::Uint8(v) => Some(*v as u64),
            DecodedValue::Uint256(v) => v.try_into().ok(),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DecodedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DecodedValue::Bytes(b) => Some(b),
            DecodedValue::Bytes32(b) => Some(b),
            DecodedValue::Address(a) => Some(a),
            _ => None,
        }
    }

    /// JSON form used for the interaction log payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DecodedValue::Address(a) => format!("0x{}", hex::encode(a)).into(),
            DecodedValue::Bytes32(b) => format!("0x{}", hex::encode(b)).into(),
            DecodedValue::Bytes(b) => format!("0x{}", hex::encode(b)).into(),
            DecodedValue::Uint256(v) => v.to_string().into(),
            DecodedValue::Int256(v) => v.to_string().into(),
            DecodedValue::Uint64(v) => v.to_string().into(),
            DecodedValue::Uint8(v) => (*v).into(),
            DecodedValue::Bool(v) => (*v).into(),
            DecodedValue::String(s) => s.clone().into(),
        }
    }
}

/// A decoded event ready for transformation.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: [u8; 32],
    pub log_index: u32,
    /// Emitter of the log
    pub contract_address: [u8; 20],
    /// Contract group name (e.g. "CampaignBanks")
    pub source_name: String,
    /// Event name (e.g., "CampaignCreated")
    pub event_name: String,
    /// Decoded parameter values keyed by field name.
    pub params: HashMap<String, DecodedValue>,
}

impl DecodedEvent {
    pub fn new(
        source_name: impl Into<String>,
        event_name: impl Into<String>,
        contract_address: [u8; 20],
        block_number: u64,
        block_timestamp: u64,
    ) -> Self {
        Self {
            block_number,
            block_timestamp,
            transaction_hash: [0u8; 32],
            log_index: 0,
            contract_address,
            source_name: source_name.into(),
            event_name: event_name.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_log_position(mut self, transaction_hash: [u8; 32], log_index: u32) -> Self {
        self.transaction_hash = transaction_hash;
        self.log_index = log_index;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: DecodedValue) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Get a parameter by name, returning an error if missing.
    pub fn get(&self, name: &str) -> Result<&DecodedValue, TransformationError> {
        self.params
            .get(name)
            .ok_or_else(|| TransformationError::MissingField(name.to_string()))
    }

    /// Try to get a parameter by name.
    pub fn try_get(&self, name: &str) -> Option<&DecodedValue> {
        self.params.get(name)
    }

    pub fn address(&self, name: &str) -> Result<[u8; 20], TransformationError> {
        self.get(name)?
            .as_address()
            .ok_or_else(|| self.conversion(name, "address"))
    }

    pub fn uint256(&self, name: &str) -> Result<U256, TransformationError> {
        self.get(name)?
            .as_uint256()
            .ok_or_else(|| self.conversion(name, "uint256"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, TransformationError> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| self.conversion(name, "bool"))
    }

    fn conversion(&self, name: &str, expected: &str) -> TransformationError {
        TransformationError::TypeConversion(format!(
            "{}.{}: expected {}",
            self.event_name, name, expected
        ))
    }
}

/// Decoded outputs of one contract read.
#[derive(Debug, Clone)]
pub struct CallOutput {
    function: String,
    values: Vec<DynSolValue>,
}

impl CallOutput {
    pub fn new(function: impl Into<String>, value: DynSolValue) -> Self {
        let values = match value {
            DynSolValue::Tuple(values) => values,
            single => vec![single],
        };
        Self {
            function: function.into(),
            values,
        }
    }

    pub fn field(&self, index: usize) -> Result<&DynSolValue, TransformationError> {
        self.values.get(index).ok_or_else(|| {
            TransformationError::DecodeError(format!(
                "{} returned {} values, wanted index {}",
                self.function,
                self.values.len(),
                index
            ))
        })
    }

    fn unexpected(&self, index: usize, expected: &str) -> TransformationError {
        TransformationError::DecodeError(format!(
            "{} output {} is not {}",
            self.function, index, expected
        ))
    }

    pub fn address(&self, index: usize) -> Result<[u8; 20], TransformationError> {
        self.field(index)?
            .as_address()
            .map(|a| a.into())
            .ok_or_else(|| self.unexpected(index, "an address"))
    }

    pub fn uint256(&self, index: usize) -> Result<U256, TransformationError> {
        self.field(index)?
            .as_uint()
            .map(|(v, _)| v)
            .ok_or_else(|| self.unexpected(index, "an unsigned integer"))
    }

    pub fn string(&self, index: usize) -> Result<String, TransformationError> {
        self.field(index)?
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| self.unexpected(index, "a string"))
    }

    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], TransformationError> {
        match self.field(index)? {
            DynSolValue::FixedBytes(word, 32) => Ok(word.0),
            _ => Err(self.unexpected(index, "bytes32")),
        }
    }

    pub fn bool(&self, index: usize) -> Result<bool, TransformationError> {
        self.field(index)?
            .as_bool()
            .ok_or_else(|| self.unexpected(index, "a bool"))
    }
}

/// Services shared by every handler of one chain.
#[derive(Clone)]
pub struct HandlerContext {
    pub chain_name: String,
    pub chain_id: u64,
    pub store: Arc<dyn EntityStore>,
    pub reader: Arc<dyn ChainReader>,
}

impl HandlerContext {
    pub fn new(
        chain_name: impl Into<String>,
        chain_id: u64,
        store: Arc<dyn EntityStore>,
        reader: Arc<dyn ChainReader>,
    ) -> Self {
        Self {
            chain_name: chain_name.into(),
            chain_id,
            store,
            reader,
        }
    }

    /// Read a contract at a specific block.
    ///
    /// The function signature should include parameter types and return type:
    /// - "balanceOf(address)(uint256)"
    /// - "getLink()(uint256,address)"
    pub async fn call(
        &self,
        contract_address: [u8; 20],
        function_signature: &str,
        params: Vec<DynSolValue>,
        block_number: u64,
    ) -> Result<CallOutput, TransformationError> {
        let call = ContractCall::new(contract_address, function_signature).with_args(params);
        let value = self.reader.call(&call, block_number).await?;
        Ok(CallOutput::new(call.function_name(), value))
    }

    /// Batch several reads at the same block.
    pub async fn multicall(
        &self,
        calls: Vec<ContractCall>,
        block_number: u64,
        allow_failure: bool,
    ) -> Result<Vec<Result<CallOutput, RpcError>>, TransformationError> {
        let results = self
            .reader
            .multicall(&calls, block_number, allow_failure)
            .await?;

        Ok(calls
            .iter()
            .zip(results)
            .map(|(call, result)| result.map(|value| CallOutput::new(call.function_name(), value)))
            .collect())
    }
}
