use crate::models::{Column, Field, FromValue, ModelError, ModelResult, Record, Row, Value};
use derive_more::Display;
use std::str::FromStr;

/// Kind of infraction a moderator can hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum InfractionKind {
    #[display("warn")]
    Warn,
    #[display("strike")]
    Strike,
}

impl FromStr for InfractionKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(Self::Warn),
            "strike" => Ok(Self::Strike),
            other => Err(ModelError::Decode(format!("unknown infraction type {other}"))),
        }
    }
}

impl From<InfractionKind> for Value {
    fn from(kind: InfractionKind) -> Self {
        Self::Text(kind.to_string())
    }
}

impl FromValue for InfractionKind {
    fn from_value(value: Value) -> ModelResult<Self> {
        String::from_value(value)?.parse()
    }
}

/// A warn or strike recorded against a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infraction {
    pub user: u64,
    pub kind: InfractionKind,
    pub reason: Option<String>,
    pub moderator: u64,
    /// Unix time the infraction was issued
    pub date: i64,
}

impl Infraction {
    pub const USER: Field<Self, u64> = Field::new("user");
    pub const KIND: Field<Self, InfractionKind> = Field::new("type");
    pub const MODERATOR: Field<Self, u64> = Field::new("moderator");
}

impl Record for Infraction {
    fn columns() -> Vec<Column> {
        vec![
            Column::integer("user"),
            Column::text("type"),
            Column::text("reason").optional(),
            Column::integer("moderator"),
            Column::integer("date"),
        ]
    }

    fn from_row(mut row: Row<'_>) -> ModelResult<Self> {
        Ok(Self {
            user: row.take("user")?,
            kind: row.take("type")?,
            reason: row.take("reason")?,
            moderator: row.take("moderator")?,
            date: row.take("date")?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.user.into(),
            self.kind.into(),
            self.reason.clone().into(),
            self.moderator.into(),
            self.date.into(),
        ]
    }
}

/// Free-form moderator note about a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub user: u64,
    pub moderator: u64,
    pub content: String,
    pub date: i64,
}

impl Note {
    pub const ID: Field<Self, String> = Field::new("id");
    pub const USER: Field<Self, u64> = Field::new("user");
}

impl Record for Note {
    fn columns() -> Vec<Column> {
        vec![
            Column::text("id").unique(),
            Column::integer("user"),
            Column::integer("moderator"),
            Column::text("content"),
            Column::integer("date"),
        ]
    }

    fn from_row(mut row: Row<'_>) -> ModelResult<Self> {
        Ok(Self {
            id: row.take("id")?,
            user: row.take("user")?,
            moderator: row.take("moderator")?,
            content: row.take("content")?,
            date: row.take("date")?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.clone().into(),
            self.user.into(),
            self.moderator.into(),
            self.content.clone().into(),
            self.date.into(),
        ]
    }
}

/// A timed mute that has not been lifted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mute {
    pub user: u64,
    /// Unix time at which the mute role is removed
    pub until: i64,
    pub reason: Option<String>,
}

impl Mute {
    pub const USER: Field<Self, u64> = Field::new("user");
    pub const UNTIL: Field<Self, i64> = Field::new("until");
}

impl Record for Mute {
    fn columns() -> Vec<Column> {
        vec![
            Column::integer("user").unique(),
            Column::integer("until"),
            Column::text("reason").optional(),
        ]
    }

    fn from_row(mut row: Row<'_>) -> ModelResult<Self> {
        Ok(Self {
            user: row.take("user")?,
            until: row.take("until")?,
            reason: row.take("reason")?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.user.into(),
            self.until.into(),
            self.reason.clone().into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SqliteStore, Store, Table};
    use std::sync::Arc;

    #[test]
    fn test_infraction_kind_text() {
        assert_eq!(InfractionKind::Warn.to_string(), "warn");
        assert_eq!("strike".parse::<InfractionKind>().unwrap(), InfractionKind::Strike);
        assert!("ban".parse::<InfractionKind>().is_err());
    }

    #[tokio::test]
    async fn test_infraction_reason_is_optional() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let infractions = Table::<Infraction>::new(store).unwrap();
        infractions.ensure().await.unwrap();

        infractions
            .create([
                ("user", Value::from(10u64)),
                ("type", Value::from(InfractionKind::Warn)),
                ("moderator", Value::from(20u64)),
                ("date", Value::from(1_700_000_000i64)),
            ])
            .await
            .unwrap();

        let found = infractions
            .find([
                Infraction::USER.equals(10u64),
                Infraction::KIND.equals(InfractionKind::Warn),
            ])
            .await
            .unwrap();
        assert_eq!(
            found,
            vec![Infraction {
                user: 10,
                kind: InfractionKind::Warn,
                reason: None,
                moderator: 20,
                date: 1_700_000_000,
            }]
        );
    }
}
