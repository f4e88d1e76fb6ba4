use crate::db::{ColumnKind, DbError, DbValue, Entity, Record};

/// ERC-20 metadata, immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub address: [u8; 20],
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Entity for Token {
    const TABLE: &'static str = "tokens";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("id", ColumnKind::Address),
        ("name", ColumnKind::Text),
        ("symbol", ColumnKind::Text),
        ("decimals", ColumnKind::Int2),
    ];

    fn key_value(&self) -> DbValue {
        DbValue::Address(self.address)
    }

    fn to_record(&self) -> Record {
        Record::new(Self::TABLE)
            .with("id", DbValue::Address(self.address))
            .with("name", DbValue::Text(self.name.clone()))
            .with("symbol", DbValue::Text(self.symbol.clone()))
            .with("decimals", DbValue::Int2(self.decimals))
    }

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Self {
            address: record.address("id")?,
            name: record.text("name")?.to_string(),
            symbol: record.text("symbol")?.to_string(),
            decimals: record.int2("decimals")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_conversion() {
        let token = Token {
            address: [7u8; 20],
            name: "Frak EUR".to_string(),
            symbol: "fEUR".to_string(),
            decimals: 18,
        };

        let record = token.to_record();
        assert_eq!(record.table(), "tokens");
        assert_eq!(Token::from_record(&record).unwrap(), token);
    }
}
