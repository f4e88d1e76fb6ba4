use alloy::primitives::U256;

use super::{numeric, read_numeric};
use crate::db::{ColumnKind, DbError, DbValue, Entity, Patch, Record};

/// A campaign bank holding the reward token for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankingContract {
    pub address: [u8; 20],
    pub token: [u8; 20],
    pub product_id: U256,
    pub total_distributed: U256,
    pub total_claimed: U256,
    pub is_distributing: bool,
}

impl BankingContract {
    pub const IS_DISTRIBUTING: &'static str = "is_distributing";
    pub const TOTAL_DISTRIBUTED: &'static str = "total_distributed";
    pub const TOTAL_CLAIMED: &'static str = "total_claimed";

    /// A freshly discovered bank with zeroed totals.
    pub fn new(address: [u8; 20], product_id: U256, token: [u8; 20]) -> Self {
        Self {
            address,
            token,
            product_id,
            total_distributed: U256::ZERO,
            total_claimed: U256::ZERO,
            is_distributing: false,
        }
    }

    /// Overlay the plain `Set` assignments of `patch` onto this row.
    pub fn with_patch(mut self, patch: &Patch) -> Self {
        for (column, value) in patch.set_values() {
            if let (Self::IS_DISTRIBUTING, DbValue::Bool(v)) = (column.as_str(), value) {
                self.is_distributing = *v;
            }
        }
        self
    }

    pub fn distribution_state_patch(is_distributing: bool) -> Patch {
        Patch::new().set(Self::IS_DISTRIBUTING, DbValue::Bool(is_distributing))
    }

    pub fn distributed_patch(amount: U256) -> Patch {
        Patch::new().add(Self::TOTAL_DISTRIBUTED, numeric(amount))
    }

    pub fn claimed_patch(amount: U256) -> Patch {
        Patch::new().add(Self::TOTAL_CLAIMED, numeric(amount))
    }
}

impl Entity for BankingContract {
    const TABLE: &'static str = "banking_contracts";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("id", ColumnKind::Address),
        ("token_id", ColumnKind::Address),
        ("product_id", ColumnKind::Numeric),
        ("total_distributed", ColumnKind::Numeric),
        ("total_claimed", ColumnKind::Numeric),
        ("is_distributing", ColumnKind::Bool),
    ];

    fn key_value(&self) -> DbValue {
        DbValue::Address(self.address)
    }

    fn to_record(&self) -> Record {
        Record::new(Self::TABLE)
            .with("id", DbValue::Address(self.address))
            .with("token_id", DbValue::Address(self.token))
            .with("product_id", numeric(self.product_id))
            .with(Self::TOTAL_DISTRIBUTED, numeric(self.total_distributed))
            .with(Self::TOTAL_CLAIMED, numeric(self.total_claimed))
            .with(Self::IS_DISTRIBUTING, DbValue::Bool(self.is_distributing))
    }

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Self {
            address: record.address("id")?,
            token: record.address("token_id")?,
            product_id: read_numeric(record, "product_id")?,
            total_distributed: read_numeric(record, Self::TOTAL_DISTRIBUTED)?,
            total_claimed: read_numeric(record, Self::TOTAL_CLAIMED)?,
            is_distributing: record.bool(Self::IS_DISTRIBUTING)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bank_has_zero_totals_and_takes_patch() {
        let bank = BankingContract::new([1u8; 20], U256::from(3u64), [2u8; 20])
            .with_patch(&BankingContract::distribution_state_patch(true));

        assert_eq!(bank.total_distributed, U256::ZERO);
        assert_eq!(bank.total_claimed, U256::ZERO);
        assert!(bank.is_distributing);
    }

    #[test]
    fn test_increments_are_not_seeded() {
        let bank = BankingContract::new([1u8; 20], U256::from(3u64), [2u8; 20])
            .with_patch(&BankingContract::claimed_patch(U256::from(50u64)));
        assert_eq!(bank.total_claimed, U256::ZERO);
    }

    #[test]
    fn test_record_round_trip_keeps_large_amounts() {
        let mut bank = BankingContract::new([1u8; 20], U256::from(3u64), [2u8; 20]);
        bank.total_distributed = U256::MAX;

        let decoded = BankingContract::from_record(&bank.to_record()).unwrap();
        assert_eq!(decoded, bank);
    }
}
