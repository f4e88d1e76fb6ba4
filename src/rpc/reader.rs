//! Block-pinned contract reads used by the aggregation handlers.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use super::abi::{compute_function_selector, encode_call_with_params, FunctionSignature};
use super::rpc::{RpcClient, RpcError};

/// Canonical Multicall3 deployment, identical on every supported chain.
pub const MULTICALL3_ADDRESS: [u8; 20] = [
    0xca, 0x11, 0xbd, 0xe0, 0x59, 0x77, 0xb3, 0x63, 0x11, 0x67, 0x02, 0x88, 0x62, 0xbe, 0x2a, 0x17,
    0x39, 0x76, 0xca, 0x11,
];

/// One read against one contract.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub address: [u8; 20],
    /// Signature with inputs and outputs, e.g. `"getLink()(uint256,address)"`.
    pub signature: String,
    pub args: Vec<DynSolValue>,
}

impl ContractCall {
    pub fn new(address: [u8; 20], signature: impl Into<String>) -> Self {
        Self {
            address,
            signature: signature.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<DynSolValue>) -> Self {
        self.args = args;
        self
    }

    /// Function name without its argument list.
    pub fn function_name(&self) -> &str {
        self.signature
            .split('(')
            .next()
            .unwrap_or(&self.signature)
    }
}

/// Reads contract state as of a given block.
///
/// Results are always a tuple of the signature's declared outputs.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, call: &ContractCall, block_number: u64) -> Result<DynSolValue, RpcError>;

    /// Execute several reads at the same block.
    ///
    /// With `allow_failure`, each read reports its own outcome. Without it, the
    /// first failure aborts the whole batch and no results are returned.
    async fn multicall(
        &self,
        calls: &[ContractCall],
        block_number: u64,
        allow_failure: bool,
    ) -> Result<Vec<Result<DynSolValue, RpcError>>, RpcError> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            match self.call(call, block_number).await {
                Ok(value) => results.push(Ok(value)),
                Err(e) if allow_failure => results.push(Err(e)),
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }
}

/// [`ChainReader`] over JSON-RPC, batching reads through Multicall3 `aggregate3`.
pub struct RpcChainReader {
    client: RpcClient,
    multicall_address: [u8; 20],
    batch_size: usize,
}

impl RpcChainReader {
    pub fn new(client: RpcClient, multicall_address: [u8; 20], batch_size: usize) -> Self {
        Self {
            client,
            multicall_address,
            batch_size: batch_size.max(1),
        }
    }

    async fn aggregate3(
        &self,
        calls: &[(&ContractCall, FunctionSignature)],
        block_number: u64,
        allow_failure: bool,
    ) -> Result<Vec<(bool, Vec<u8>)>, RpcError> {
        let calldata = build_multicall_calldata(calls, allow_failure);
        let tx = TransactionRequest::default()
            .to(Address::from(self.multicall_address))
            .input(Bytes::from(calldata).into());

        let raw = self.client.call(tx, block_number).await?;
        decode_multicall_results(&raw, calls.len()).map_err(RpcError::Multicall)
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn call(&self, call: &ContractCall, block_number: u64) -> Result<DynSolValue, RpcError> {
        let signature = FunctionSignature::parse(&call.signature)?;
        let tx = TransactionRequest::default()
            .to(Address::from(call.address))
            .input(Bytes::from(signature.encode_call(&call.args)).into());

        let raw = self.client.call(tx, block_number).await?;
        signature.decode_output(&raw)
    }

    async fn multicall(
        &self,
        calls: &[ContractCall],
        block_number: u64,
        allow_failure: bool,
    ) -> Result<Vec<Result<DynSolValue, RpcError>>, RpcError> {
        let parsed = calls
            .iter()
            .map(|call| Ok((call, FunctionSignature::parse(&call.signature)?)))
            .collect::<Result<Vec<_>, RpcError>>()?;

        let mut results = Vec::with_capacity(calls.len());

        for chunk in parsed.chunks(self.batch_size) {
            tracing::debug!(
                "aggregate3 with {} calls at block {} (allow_failure={})",
                chunk.len(),
                block_number,
                allow_failure
            );

            let outcomes = self.aggregate3(chunk, block_number, allow_failure).await?;

            for ((call, signature), (success, data)) in chunk.iter().zip(outcomes) {
                let result = if success {
                    signature.decode_output(&data)
                } else {
                    Err(RpcError::reverted(call.address, &signature.name))
                };

                match result {
                    Err(e) if !allow_failure => return Err(e),
                    other => results.push(other),
                }
            }
        }

        Ok(results)
    }
}

/// Build aggregate3 calldata for a batch of reads.
/// Encodes as: aggregate3((address target, bool allowFailure, bytes callData)[])
fn build_multicall_calldata(calls: &[(&ContractCall, FunctionSignature)], allow_failure: bool) -> Vec<u8> {
    let selector = compute_function_selector("aggregate3((address,bool,bytes)[])");

    let call_tuples: Vec<DynSolValue> = calls
        .iter()
        .map(|(call, signature)| {
            DynSolValue::Tuple(vec![
                DynSolValue::Address(Address::from(call.address)),
                DynSolValue::Bool(allow_failure),
                DynSolValue::Bytes(signature.encode_call(&call.args)),
            ])
        })
        .collect();

    encode_call_with_params(selector, &[DynSolValue::Array(call_tuples)])
}

/// Decode the return data from an aggregate3 call.
/// Returns Vec<(success: bool, returnData: Vec<u8>)>.
fn decode_multicall_results(
    return_data: &[u8],
    expected_count: usize,
) -> Result<Vec<(bool, Vec<u8>)>, String> {
    let result_type = DynSolType::Array(Box::new(DynSolType::Tuple(vec![
        DynSolType::Bool,
        DynSolType::Bytes,
    ])));

    let decoded = result_type
        .abi_decode(return_data)
        .map_err(|e| format!("Failed to decode multicall results: {}", e))?;

    let DynSolValue::Array(items) = decoded else {
        return Err("Expected array from multicall decode".to_string());
    };

    if items.len() != expected_count {
        return Err(format!(
            "Multicall returned {} results, expected {}",
            items.len(),
            expected_count
        ));
    }

    Ok(items
        .into_iter()
        .map(|item| match item {
            DynSolValue::Tuple(fields) => match fields.as_slice() {
                [DynSolValue::Bool(success), DynSolValue::Bytes(data)] => (*success, data.clone()),
                _ => (false, Vec::new()),
            },
            _ => (false, Vec::new()),
        })
        .collect())
}
