use crate::models::{Column, Field, ModelResult, Record, Row, Value};

/// An open mail conversation between one user and the staff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRoom {
    /// User who opened the room; one room per user
    pub user: u64,
    /// Staff channel the conversation is relayed into
    pub channel: u64,
    /// Unix time the room was opened
    pub date: i64,
    /// The message that opened the room
    pub message: String,
}

impl MailRoom {
    pub const USER: Field<Self, u64> = Field::new("user");
    pub const CHANNEL: Field<Self, u64> = Field::new("channel");
}

impl Record for MailRoom {
    fn columns() -> Vec<Column> {
        vec![
            Column::integer("user").unique(),
            Column::integer("channel"),
            Column::integer("date"),
            Column::text("message"),
        ]
    }

    fn from_row(mut row: Row<'_>) -> ModelResult<Self> {
        Ok(Self {
            user: row.take("user")?,
            channel: row.take("channel")?,
            date: row.take("date")?,
            message: row.take("message")?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.user.into(),
            self.channel.into(),
            self.date.into(),
            self.message.clone().into(),
        ]
    }
}
