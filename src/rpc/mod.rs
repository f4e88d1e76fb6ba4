mod abi;
mod reader;
mod rpc;

pub use abi::FunctionSignature;
pub use reader::{ChainReader, ContractCall, RpcChainReader, MULTICALL3_ADDRESS};
pub use rpc::{RpcClient, RpcClientConfig, RpcError};
