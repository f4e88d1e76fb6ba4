//! JSON-lines event source for the replay binary.
//!
//! Each non-empty line is one decoded log:
//!
//! ```json
//! {"source": "CampaignsFactory", "event": "CampaignCreated",
//!  "address": "0x...", "block_number": 10, "block_timestamp": 1700000000,
//!  "transaction_hash": "0x...", "log_index": 0,
//!  "params": {"campaign": {"type": "address", "value": "0x..."}}}
//! ```
//!
//! Lines starting with `#` are ignored.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;

use crate::transformations::{DecodedEvent, DecodedValue};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: invalid {kind} '{value}'")]
    InvalidValue {
        line: usize,
        kind: &'static str,
        value: String,
    },

    #[error("Event channel closed")]
    ChannelClosed,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
enum ReplayValue {
    Address(String),
    Uint256(String),
    Bool(bool),
    Bytes32(String),
    String(String),
}

#[derive(Debug, Deserialize)]
struct ReplayEvent {
    source: String,
    event: String,
    address: String,
    block_number: u64,
    block_timestamp: u64,
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    log_index: Option<u32>,
    #[serde(default)]
    params: HashMap<String, ReplayValue>,
}

fn parse_address(line: usize, value: &str) -> Result<[u8; 20], ReplayError> {
    Address::from_str(value.trim())
        .map(|a| a.into())
        .map_err(|_| ReplayError::InvalidValue {
            line,
            kind: "address",
            value: value.to_string(),
        })
}

fn parse_bytes32(line: usize, value: &str) -> Result<[u8; 32], ReplayError> {
    B256::from_str(value.trim())
        .map(|b| b.0)
        .map_err(|_| ReplayError::InvalidValue {
            line,
            kind: "bytes32",
            value: value.to_string(),
        })
}

fn decode_value(line: usize, value: ReplayValue) -> Result<DecodedValue, ReplayError> {
    Ok(match value {
        ReplayValue::Address(v) => DecodedValue::Address(parse_address(line, &v)?),
        ReplayValue::Uint256(v) => DecodedValue::Uint256(U256::from_str(v.trim()).map_err(
            |_| ReplayError::InvalidValue {
                line,
                kind: "uint256",
                value: v.clone(),
            },
        )?),
        ReplayValue::Bool(v) => DecodedValue::Bool(v),
        ReplayValue::Bytes32(v) => DecodedValue::Bytes32(parse_bytes32(line, &v)?),
        ReplayValue::String(v) => DecodedValue::String(v),
    })
}

/// Parse one line. Returns `None` for blank and comment lines.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<DecodedEvent>, ReplayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let raw: ReplayEvent = serde_json::from_str(trimmed).map_err(|source| ReplayError::Json {
        line: line_number,
        source,
    })?;

    let mut event = DecodedEvent::new(
        raw.source,
        raw.event,
        parse_address(line_number, &raw.address)?,
        raw.block_number,
        raw.block_timestamp,
    );

    let transaction_hash = match &raw.transaction_hash {
        Some(hash) => parse_bytes32(line_number, hash)?,
        None => [0u8; 32],
    };
    // Without an explicit position, the line number keeps interaction ids unique.
    let log_index = match raw.log_index {
        Some(index) => index,
        None => u32::try_from(line_number).unwrap_or(u32::MAX),
    };
    event = event.with_log_position(transaction_hash, log_index);

    for (name, value) in raw.params {
        event = event.with_param(name, decode_value(line_number, value)?);
    }

    Ok(Some(event))
}

/// Send every event of the file at `path` to `tx`, in file order.
pub async fn stream_file(path: &Path, tx: Sender<DecodedEvent>) -> Result<usize, ReplayError> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut line_number = 0;
    let mut sent = 0;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if let Some(event) = parse_line(line_number, &line)? {
            tx.send(event).await.map_err(|_| ReplayError::ChannelClosed)?;
            sent += 1;
        }
    }

    tracing::info!("Replayed {} events from {}", sent, path.display());
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interaction_line() {
        let line = format!(
            r#"{{"source": "ProductInteraction", "event": "PurchaseStarted",
                "address": "0x{}", "block_number": 12, "block_timestamp": 1700000000,
                "transaction_hash": "0x{}", "log_index": 4,
                "params": {{
                    "purchaseId": {{"type": "uint256", "value": "42"}},
                    "user": {{"type": "address", "value": "0x{}"}}
                }}}}"#,
            "0c".repeat(20),
            "ab".repeat(32),
            "11".repeat(20)
        );

        let event = parse_line(1, &line).unwrap().unwrap();
        assert_eq!(event.source_name, "ProductInteraction");
        assert_eq!(event.event_name, "PurchaseStarted");
        assert_eq!(event.contract_address, [0x0c; 20]);
        assert_eq!(event.transaction_hash, [0xab; 32]);
        assert_eq!(event.log_index, 4);
        assert_eq!(event.uint256("purchaseId").unwrap(), U256::from(42u64));
        assert_eq!(event.address("user").unwrap(), [0x11; 20]);
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        assert!(parse_line(1, "   ").unwrap().is_none());
        assert!(parse_line(2, "# CampaignCreated at block 10").unwrap().is_none());
    }

    #[test]
    fn test_missing_position_uses_line_number() {
        let line = format!(
            r#"{{"source": "CampaignsFactory", "event": "CampaignCreated", "address": "0x{}",
                "block_number": 1, "block_timestamp": 2,
                "params": {{"campaign": {{"type": "address", "value": "0x{}"}}}}}}"#,
            "fa".repeat(20),
            "0a".repeat(20)
        );
        let event = parse_line(7, &line).unwrap().unwrap();
        assert_eq!(event.log_index, 7);
    }

    #[test]
    fn test_invalid_values_report_line() {
        let line = r#"{"source": "S", "event": "E", "address": "0x1234",
                       "block_number": 1, "block_timestamp": 2}"#;
        assert!(matches!(
            parse_line(3, line),
            Err(ReplayError::InvalidValue { line: 3, kind: "address", .. })
        ));
        assert!(matches!(parse_line(4, "{not json"), Err(ReplayError::Json { line: 4, .. })));
    }

    #[tokio::test]
    async fn test_stream_file_in_order() {
        let path = std::env::temp_dir().join(format!("campaign-replay-{}.jsonl", std::process::id()));
        let body = [
            "# two events".to_string(),
            format!(
                r#"{{"source": "CampaignsFactory", "event": "CampaignCreated", "address": "0x{}", "block_number": 1, "block_timestamp": 10}}"#,
                "fa".repeat(20)
            ),
            format!(
                r#"{{"source": "CampaignsFactory", "event": "CampaignCreated", "address": "0x{}", "block_number": 2, "block_timestamp": 20}}"#,
                "fa".repeat(20)
            ),
        ]
        .join("\n");
        tokio::fs::write(&path, body).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let sent = stream_file(&path, tx).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(sent, 2);
        assert_eq!(rx.recv().await.unwrap().block_number, 1);
        assert_eq!(rx.recv().await.unwrap().block_number, 2);
        assert!(rx.recv().await.is_none());
    }
}
