//! Token Resolver: records ERC-20 metadata the first time a token is referenced.

use super::context::HandlerContext;
use super::error::TransformationError;
use crate::db::{DbValue, EntityStoreExt};
use crate::entities::Token;
use crate::rpc::ContractCall;

/// Insert the token row unless it already exists.
///
/// A failed read is returned to the caller; nothing is written in that case.
pub async fn ensure_token(
    ctx: &HandlerContext,
    address: [u8; 20],
    block_number: u64,
) -> Result<(), TransformationError> {
    if ctx
        .store
        .find::<Token>(DbValue::Address(address))
        .await?
        .is_some()
    {
        return Ok(());
    }

    let calls = vec![
        ContractCall::new(address, "name()(string)"),
        ContractCall::new(address, "symbol()(string)"),
        ContractCall::new(address, "decimals()(uint8)"),
    ];

    let results = match ctx.multicall(calls, block_number, false).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(
                "Failed to read metadata of token 0x{} at block {}: {}",
                hex::encode(address),
                block_number,
                e
            );
            return Err(e);
        }
    };

    let mut outputs = results.into_iter();
    let mut next = || -> Result<_, TransformationError> {
        outputs
            .next()
            .ok_or_else(|| TransformationError::MissingData("token metadata".to_string()))?
            .map_err(TransformationError::from)
    };

    let name = next()?.string(0)?;
    let symbol = next()?.string(0)?;
    let decimals = next()?.uint256(0)?;
    let decimals = u8::try_from(&decimals).map_err(|_| {
        TransformationError::TypeConversion(format!("decimals {} does not fit in u8", decimals))
    })?;

    let token = Token {
        address,
        name,
        symbol,
        decimals,
    };

    if ctx.store.insert_if_absent(&token).await? {
        tracing::info!(
            "Indexed token {} (0x{}, {} decimals)",
            token.symbol,
            hex::encode(address),
            token.decimals
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils::{addr, context, script_token, MockChainReader};

    #[tokio::test]
    async fn test_token_is_read_once() {
        let reader = Arc::new(MockChainReader::new());
        script_token(&reader, addr(0x70), "FRK", 18);
        let (ctx, _store) = context(reader.clone());

        ensure_token(&ctx, addr(0x70), 10).await.unwrap();
        let reads = reader.call_count();
        ensure_token(&ctx, addr(0x70), 11).await.unwrap();

        assert_eq!(reader.call_count(), reads);
        let token = ctx
            .store
            .find::<Token>(DbValue::Address(addr(0x70)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.symbol, "FRK");
        assert_eq!(token.name, "FRK token");
        assert_eq!(token.decimals, 18);
    }

    #[tokio::test]
    async fn test_unreadable_token_writes_nothing() {
        let reader = Arc::new(MockChainReader::new());
        let (ctx, store) = context(reader);

        assert!(ensure_token(&ctx, addr(0x71), 10).await.is_err());
        assert!(store.rows("tokens").await.is_empty());
        assert_eq!(store.transaction_count(), 0);
    }
}
