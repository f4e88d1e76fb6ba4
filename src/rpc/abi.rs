//! Function signature parsing and calldata encoding for ad-hoc contract reads.
//!
//! Signatures carry both the inputs and the outputs, e.g.
//! `"balanceOf(address)(uint256)"` or `"getLink()(uint256,address)"`.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::keccak256;

use super::rpc::RpcError;

/// A parsed `name(inputs)(outputs)` signature.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub selector: [u8; 4],
    pub outputs: DynSolType,
}

impl FunctionSignature {
    pub fn parse(sig: &str) -> Result<Self, RpcError> {
        let open = sig
            .find('(')
            .ok_or_else(|| RpcError::Abi(format!("Invalid function signature: {}", sig)))?;

        let close = matching_paren(sig, open).ok_or_else(|| {
            RpcError::Abi(format!("Unbalanced parentheses in signature: {}", sig))
        })?;

        let input_sig = &sig[..=close];
        let output_sig = sig[close + 1..].trim();
        if output_sig.is_empty() {
            return Err(RpcError::Abi(format!(
                "Invalid function signature, missing output type: {}",
                sig
            )));
        }

        let outputs = DynSolType::parse(output_sig).map_err(|e| {
            RpcError::Abi(format!("Failed to parse output type '{}': {}", output_sig, e))
        })?;
        let outputs = match outputs {
            tuple @ DynSolType::Tuple(_) => tuple,
            single => DynSolType::Tuple(vec![single]),
        };

        Ok(Self {
            name: sig[..open].to_string(),
            selector: compute_function_selector(input_sig),
            outputs,
        })
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn encode_call(&self, args: &[DynSolValue]) -> Vec<u8> {
        encode_call_with_params(self.selector, args)
    }

    /// Decode return data into a tuple of the declared outputs.
    pub fn decode_output(&self, data: &[u8]) -> Result<DynSolValue, RpcError> {
        self.outputs
            .abi_decode_params(data)
            .map_err(|e| RpcError::Abi(format!("Failed to decode {} output: {}", self.name, e)))
    }
}

fn matching_paren(sig: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in sig.char_indices().skip(open) {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn compute_function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[0..4]);
    selector
}

pub fn encode_call_with_params(selector: [u8; 4], params: &[DynSolValue]) -> Vec<u8> {
    let mut calldata = selector.to_vec();
    if !params.is_empty() {
        let tuple = DynSolValue::Tuple(params.to_vec());
        calldata.extend(tuple.abi_encode_params());
    }
    calldata
}
