use alloy::network::Ethereum;
use alloy::primitives::Bytes;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{BlockId, BlockNumberOrTag, TransactionRequest};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Multicall failed: {0}")]
    Multicall(String),

    #[error("Call to {function} on 0x{address} reverted")]
    Reverted { address: String, function: String },

    #[error("ABI error: {0}")]
    Abi(String),
}

impl RpcError {
    pub fn reverted(address: [u8; 20], function: &str) -> Self {
        Self::Reverted {
            address: hex::encode(address),
            function: function.to_string(),
        }
    }

    /// Check if this error is likely transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            // Transport errors are typically network issues
            RpcError::Transport(_) => true,
            // Invalid URL is permanent
            RpcError::InvalidUrl(_) => false,
            // A revert at a pinned block is deterministic
            RpcError::Reverted { .. } => false,
            RpcError::Abi(_) => false,
            RpcError::Multicall(msg) => Self::is_retryable_message(msg),
            RpcError::ProviderError(msg) => Self::is_retryable_message(msg),
        }
    }

    fn is_retryable_message(msg: &str) -> bool {
        let msg_lower = msg.to_lowercase();
        // Network/connection errors
        msg_lower.contains("connection")
            || msg_lower.contains("timeout")
            || msg_lower.contains("timed out")
            || msg_lower.contains("reset")
            || msg_lower.contains("broken pipe")
            || msg_lower.contains("network")
            || msg_lower.contains("eof")
            || msg_lower.contains("sending request")
            // Rate limiting indicators
            || msg_lower.contains("rate limit")
            || msg_lower.contains("too many requests")
            || msg_lower.contains("429")
            // Server errors (5xx)
            || msg_lower.contains("502")
            || msg_lower.contains("503")
            || msg_lower.contains("504")
            || msg_lower.contains("internal server error")
            || msg_lower.contains("service unavailable")
            || msg_lower.contains("bad gateway")
            // Block not yet known to the node
            || msg_lower.contains("header not found")
            || msg_lower.contains("unknown block")
    }
}

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub url: Url,
}

impl RpcClientConfig {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

/// Thin wrapper over an HTTP provider for `eth_call` pinned to a block.
///
/// Retries and rate limiting are left to the RPC endpoint in front of it.
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
    config: RpcClientConfig,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Self {
        let provider = RootProvider::<Ethereum>::new_http(config.url.clone());
        Self { provider, config }
    }

    pub fn from_url(url: &str) -> Result<Self, RpcError> {
        let url = Url::parse(url).map_err(|e| RpcError::InvalidUrl(e.to_string()))?;
        Ok(Self::new(RpcClientConfig::new(url)))
    }

    pub async fn call(&self, tx: TransactionRequest, block_number: u64) -> Result<Bytes, RpcError> {
        tracing::trace!("eth_call(to={:?}, block={})", tx.to, block_number);
        self.provider
            .call(tx)
            .block(BlockId::Number(BlockNumberOrTag::Number(block_number)))
            .await
            .map_err(|e| match e {
                alloy::transports::RpcError::Transport(kind) => RpcError::Transport(kind.to_string()),
                other => RpcError::ProviderError(other.to_string()),
            })
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RpcError::Transport("reset".to_string()).is_retryable());
        assert!(RpcError::ProviderError("HTTP 503 Service Unavailable".to_string()).is_retryable());
        assert!(RpcError::ProviderError("header not found".to_string()).is_retryable());
        assert!(!RpcError::ProviderError("execution reverted".to_string()).is_retryable());
        assert!(!RpcError::reverted([0u8; 20], "isActive").is_retryable());
        assert!(!RpcError::InvalidUrl("x".to_string()).is_retryable());
    }

    #[test]
    fn test_from_url_rejects_garbage() {
        assert!(matches!(
            RpcClient::from_url("not a url"),
            Err(RpcError::InvalidUrl(_))
        ));
    }
}
