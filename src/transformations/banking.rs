//! Banking Contract Resolver.
//!
//! A banking contract row is created the first time the bank is referenced,
//! from its on-chain `getConfig()`. Later references only apply their patch.

use super::context::HandlerContext;
use super::error::TransformationError;
use super::token::ensure_token;
use crate::db::{Assignment, ConflictAction, DbValue, Entity, EntityStoreExt, Patch};
use crate::entities::BankingContract;

const GET_CONFIG: &str = "getConfig()(uint256,address)";

/// Make sure the banking contract at `address` exists, then apply `patch`.
///
/// A failed `getConfig()` or token read is fatal for the event and leaves the
/// store untouched, so a redelivery applies the patch exactly once.
pub async fn ensure_banking_contract(
    ctx: &HandlerContext,
    address: [u8; 20],
    block_number: u64,
    patch: Patch,
) -> Result<(), TransformationError> {
    let key = DbValue::Address(address);

    if let Some(bank) = ctx.store.find::<BankingContract>(key.clone()).await? {
        ensure_token(ctx, bank.token, block_number).await?;
        ctx.store.update::<BankingContract>(key, patch).await?;
        return Ok(());
    }

    let config = match ctx.call(address, GET_CONFIG, vec![], block_number).await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                "Failed to read config of banking contract 0x{} at block {}: {}",
                hex::encode(address),
                block_number,
                e
            );
            return Err(e);
        }
    };
    let product_id = config.uint256(0)?;
    let token = config.address(1)?;

    ensure_token(ctx, token, block_number).await?;

    let bank = BankingContract::new(address, product_id, token).with_patch(&patch);
    let overwritten: Vec<String> = patch.set_values().map(|(c, _)| c.clone()).collect();
    let on_conflict = if overwritten.is_empty() {
        ConflictAction::DoNothing
    } else {
        ConflictAction::Overwrite(overwritten)
    };

    let increments = patch
        .assignments()
        .iter()
        .fold(Patch::new(), |acc, (column, assignment)| match assignment {
            Assignment::Add(value) => acc.add(column.clone(), value.clone()),
            Assignment::Set(_) => acc,
        });

    let mut operations = vec![bank.upsert(on_conflict)];
    if !increments.is_empty() {
        operations.push(BankingContract::update(key, increments));
    }
    ctx.store.execute_transaction(operations).await?;

    tracing::info!(
        "Indexed banking contract 0x{} for product {} (token 0x{})",
        hex::encode(address),
        product_id,
        hex::encode(token)
    );
    Ok(())
}
