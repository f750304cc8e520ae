//! Minimal table mapper
//!
//! Record types declare their columns once; [`Models::open`] registers and
//! provisions every table at startup and hands out typed [`Table`] handles
//! sharing one injected [`Store`].

mod column;
mod error;
mod mail;
mod moderation;
mod schema;
mod store;
mod table;
mod value;

pub use column::{Column, ColumnType, Field, Predicate, Query};
pub use error::{ModelError, ModelResult, StoreError};
pub use mail::MailRoom;
pub use moderation::{Infraction, InfractionKind, Mute, Note};
pub use schema::{Record, Row, SchemaRegistry, TableSchema, ensure_table};
#[cfg(test)]
pub use store::MockStore;
pub use store::{SqliteStore, Store, StoreResult};
pub use table::Table;
pub use value::{FromValue, Value};

use crate::MODEL_TARGET;
use std::sync::Arc;
use tracing::info;

/// Tables used by the bot
#[derive(Debug, Clone)]
pub struct Models {
    pub mail_rooms: Table<MailRoom>,
    pub infractions: Table<Infraction>,
    pub notes: Table<Note>,
    pub mutes: Table<Mute>,
}

impl Models {
    /// Register every record type and create any missing tables
    ///
    /// # Errors
    /// A schema error or a store error while provisioning.
    pub async fn open(store: Arc<dyn Store>) -> ModelResult<Self> {
        let mut registry = SchemaRegistry::new();
        let mail_rooms = registry.register::<MailRoom>()?.clone();
        let infractions = registry.register::<Infraction>()?.clone();
        let notes = registry.register::<Note>()?.clone();
        let mutes = registry.register::<Mute>()?.clone();

        let created = registry.ensure_all(store.as_ref()).await?;
        info!(
            target: MODEL_TARGET,
            tables = registry.iter().count(),
            created = ?created,
            "Schema ready"
        );

        Ok(Self {
            mail_rooms: Table::with_schema(Arc::clone(&store), mail_rooms),
            infractions: Table::with_schema(Arc::clone(&store), infractions),
            notes: Table::with_schema(Arc::clone(&store), notes),
            mutes: Table::with_schema(store, mutes),
        })
    }
}
