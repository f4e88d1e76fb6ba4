//! Campaign Lifecycle Manager.
//!
//! Campaigns start as shell rows so that later references never miss them.
//! Enrichment from on-chain metadata is attempted on every reference until
//! the interaction contract is known, after which it is never retried.

use super::context::{CallOutput, HandlerContext};
use super::error::TransformationError;
use crate::db::{ConflictAction, DbValue, Entity, EntityStoreExt};
use crate::entities::{
    is_affiliation_type, AffiliationCampaignStats, Campaign, CampaignMetadata, ZERO_ADDRESS,
};
use crate::rpc::{ContractCall, RpcError};

const GET_METADATA: &str = "getMetadata()(string,string,bytes32)";
const GET_LINK: &str = "getLink()(uint256,address)";
const GET_CONFIG: &str = "getConfig()((uint48,uint208),(uint48,uint48),address)";

/// Load the campaign at `address`, creating its shell row if needed, and
/// enrich it when it is still a shell.
///
/// Enrichment failures leave the campaign as it was and are not errors.
pub async fn ensure_campaign(
    ctx: &HandlerContext,
    address: [u8; 20],
    block_number: u64,
) -> Result<Campaign, TransformationError> {
    let campaign = match ctx.store.find::<Campaign>(DbValue::Address(address)).await? {
        Some(campaign) => campaign,
        None => {
            let shell = Campaign::shell(address, block_number);
            if ctx.store.insert_if_absent(&shell).await? {
                tracing::info!(
                    "Created campaign shell 0x{} at block {}",
                    hex::encode(address),
                    block_number
                );
            }
            shell
        }
    };

    if campaign.is_enriched() {
        return Ok(campaign);
    }

    enrich(ctx, campaign, block_number).await
}

async fn enrich(
    ctx: &HandlerContext,
    campaign: Campaign,
    block_number: u64,
) -> Result<Campaign, TransformationError> {
    let address = campaign.address;
    let calls = vec![
        ContractCall::new(address, GET_METADATA),
        ContractCall::new(address, GET_LINK),
        ContractCall::new(address, GET_CONFIG),
    ];

    let results = match ctx.multicall(calls, block_number, true).await {
        Ok(results) => results,
        Err(e) => {
            tracing::warn!(
                "Campaign 0x{} left unenriched at block {}: {}",
                hex::encode(address),
                block_number,
                e
            );
            return Ok(campaign);
        }
    };

    let mut results = results.into_iter();
    let (Some(metadata), Some(link)) = (results.next(), results.next()) else {
        return Err(TransformationError::MissingData(format!(
            "enrichment results for campaign 0x{}",
            hex::encode(address)
        )));
    };
    let config = results.next();

    let (metadata, link) = match (metadata, link) {
        (Ok(metadata), Ok(link)) => (metadata, link),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(
                "Campaign 0x{} left unenriched at block {}: {}",
                hex::encode(address),
                block_number,
                e
            );
            return Ok(campaign);
        }
    };

    let metadata = decode_metadata(&metadata, &link, config)?;
    let patch = Campaign::enrichment_patch(&metadata, block_number);

    let mut operations = vec![Campaign::update(DbValue::Address(address), patch)];
    if is_affiliation_type(&metadata.campaign_type) {
        operations.push(AffiliationCampaignStats::empty(address).upsert(ConflictAction::DoNothing));
    }
    ctx.store.execute_transaction(operations).await?;

    tracing::info!(
        "Enriched campaign 0x{} ({} '{}') for product {} at block {}",
        hex::encode(address),
        metadata.campaign_type,
        metadata.name,
        metadata.product_id,
        block_number
    );

    Ok(Campaign {
        campaign_type: metadata.campaign_type,
        name: metadata.name,
        version: metadata.version,
        product_id: metadata.product_id,
        interaction_contract: metadata.interaction_contract,
        banking_contract: metadata.banking_contract.or(campaign.banking_contract),
        last_update_block: block_number,
        ..campaign
    })
}

fn decode_metadata(
    metadata: &CallOutput,
    link: &CallOutput,
    config: Option<Result<CallOutput, RpcError>>,
) -> Result<CampaignMetadata, TransformationError> {
    let name = CampaignMetadata::decode_name(metadata.bytes32(2)?)
        .map_err(|e| TransformationError::DecodeError(format!("campaign name: {}", e)))?;

    let banking_contract = match config {
        Some(Ok(config)) => Some(config.address(2)?).filter(|bank| *bank != ZERO_ADDRESS),
        Some(Err(e)) => {
            tracing::debug!("Campaign config unavailable, bank left unset: {}", e);
            None
        }
        None => None,
    };

    Ok(CampaignMetadata {
        campaign_type: metadata.string(0)?,
        version: metadata.string(1)?,
        name,
        product_id: link.uint256(0)?,
        interaction_contract: link.address(1)?,
        banking_contract,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::U256;

    use super::*;
    use crate::entities::StatsCounter;
    use crate::test_utils::{addr, context, link, metadata, script_campaign, MockChainReader};

    #[tokio::test]
    async fn test_replayed_creation_yields_one_shell() {
        let reader = Arc::new(MockChainReader::new());
        let (ctx, store) = context(reader);

        for block in [10, 11, 12] {
            let campaign = ensure_campaign(&ctx, addr(0xa), block).await.unwrap();
            assert!(!campaign.is_enriched());
        }

        let rows = store.rows("campaigns").await;
        assert_eq!(rows.len(), 1);
        let shell = Campaign::from_record(&rows[0]).unwrap();
        assert_eq!(shell.campaign_type, "0");
        assert!(!shell.attached);
        assert_eq!(shell.last_update_block, 10);
    }

    #[tokio::test]
    async fn test_enrichment_runs_once() {
        let reader = Arc::new(MockChainReader::new());
        script_campaign(&reader, addr(0xa), "frak.campaign.referral", 1, addr(0xc), addr(0xb));
        let (ctx, store) = context(reader.clone());

        let campaign = ensure_campaign(&ctx, addr(0xa), 10).await.unwrap();
        assert!(campaign.is_enriched());
        assert_eq!(campaign.name, "My campaign");
        assert_eq!(campaign.banking_contract, Some(addr(0xb)));

        let reads = reader.call_count();
        let writes = store.transaction_count();
        let again = ensure_campaign(&ctx, addr(0xa), 11).await.unwrap();

        assert_eq!(reader.call_count(), reads);
        assert_eq!(store.transaction_count(), writes);
        assert_eq!(again, campaign);
    }

    #[tokio::test]
    async fn test_missing_config_keeps_rest_of_enrichment() {
        let reader = Arc::new(MockChainReader::new());
        reader.respond(addr(0xa), "getMetadata", metadata("frak.campaign.referral", "0.0.1", "Ref"));
        reader.respond(addr(0xa), "getLink", link(3, addr(0xc)));
        reader.revert(addr(0xa), "getConfig");
        let (ctx, _store) = context(reader);

        ensure_campaign(&ctx, addr(0xa), 10).await.unwrap();

        let stored = ctx
            .store
            .find::<Campaign>(DbValue::Address(addr(0xa)))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_enriched());
        assert_eq!(stored.product_id, U256::from(3u64));
        assert_eq!(stored.interaction_contract, addr(0xc));
        assert_eq!(stored.banking_contract, None);
    }

    #[tokio::test]
    async fn test_failed_metadata_leaves_shell_until_next_reference() {
        let reader = Arc::new(MockChainReader::new());
        reader.revert(addr(0xa), "getMetadata");
        reader.respond(addr(0xa), "getLink", link(3, addr(0xc)));
        let (ctx, _store) = context(reader);

        let shell = ensure_campaign(&ctx, addr(0xa), 10).await.unwrap();
        assert!(!shell.is_enriched());

        let reader = Arc::new(MockChainReader::new());
        script_campaign(&reader, addr(0xa), "frak.campaign.referral", 3, addr(0xc), addr(0xb));
        let retry_ctx = HandlerContext::new("test", 421614, ctx.store.clone(), reader);

        let enriched = ensure_campaign(&retry_ctx, addr(0xa), 20).await.unwrap();
        assert!(enriched.is_enriched());
        assert_eq!(enriched.last_update_block, 20);
    }

    #[tokio::test]
    async fn test_outage_is_not_an_error() {
        let reader = Arc::new(MockChainReader::new());
        reader.set_offline(true);
        let (ctx, store) = context(reader);

        let campaign = ensure_campaign(&ctx, addr(0xa), 10).await.unwrap();
        assert!(!campaign.is_enriched());
        assert_eq!(store.rows("campaigns").await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_name_is_a_decode_error() {
        let reader = Arc::new(MockChainReader::new());
        let mut raw = [0u8; 32];
        raw[0] = 0xff;
        reader.respond(
            addr(0xa),
            "getMetadata",
            alloy::dyn_abi::DynSolValue::Tuple(vec![
                alloy::dyn_abi::DynSolValue::String("frak.campaign.referral".to_string()),
                alloy::dyn_abi::DynSolValue::String("0.0.1".to_string()),
                alloy::dyn_abi::DynSolValue::FixedBytes(raw.into(), 32),
            ]),
        );
        reader.respond(addr(0xa), "getLink", link(3, addr(0xc)));
        let (ctx, _store) = context(reader);

        let result = ensure_campaign(&ctx, addr(0xa), 10).await;
        assert!(matches!(result, Err(TransformationError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_stats_row_only_for_affiliation_campaigns() {
        let reader = Arc::new(MockChainReader::new());
        script_campaign(&reader, addr(0xa), "frak.campaign.referral", 1, addr(0xc), addr(0xb));
        script_campaign(&reader, addr(0xd), "frak.campaign.other", 1, addr(0xc), addr(0xb));
        let (ctx, store) = context(reader);

        ensure_campaign(&ctx, addr(0xa), 10).await.unwrap();
        ensure_campaign(&ctx, addr(0xd), 10).await.unwrap();

        let rows = store.rows("affiliation_campaign_stats").await;
        assert_eq!(rows.len(), 1);
        let stats = AffiliationCampaignStats::from_record(&rows[0]).unwrap();
        assert_eq!(stats.campaign_id, addr(0xa));
        for counter in StatsCounter::ALL {
            assert_eq!(stats.get(counter), U256::ZERO);
        }
    }
}
