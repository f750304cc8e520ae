//! Record schemas and table provisioning
//!
//! Schemas are built and validated from a [`Record`] declaration without
//! touching the store. Tables are provisioned separately, once, at startup
//! through [`SchemaRegistry::ensure_all`] or [`ensure_table`].

use crate::MODEL_TARGET;
use crate::models::{Column, FromValue, ModelError, ModelResult, Store, Value};
use std::collections::HashSet;
use tracing::{debug, info};

/// A record type mapped onto one table
pub trait Record: Sized + Send + Sync + 'static {
    /// Overrides the table name derived from the type name
    const TABLE_NAME: Option<&'static str> = None;

    /// Columns in declaration order
    fn columns() -> Vec<Column>;

    /// Materialize a record from a result row
    ///
    /// # Errors
    /// Returns [`ModelError::Decode`] if a value has the wrong type.
    fn from_row(row: Row<'_>) -> ModelResult<Self>;

    /// Column values in declaration order
    fn to_values(&self) -> Vec<Value>;

    /// Table name: the override, or the lower-cased type name
    #[must_use]
    fn table_name() -> String {
        Self::TABLE_NAME.map_or_else(
            || {
                let path = std::any::type_name::<Self>();
                let short = path.split('<').next().unwrap_or(path);
                short.rsplit("::").next().unwrap_or(short).to_lowercase()
            },
            str::to_owned,
        )
    }
}

/// Validated table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    definitions: Vec<String>,
    key: Option<usize>,
}

impl TableSchema {
    /// Build a schema, compiling every column up front
    ///
    /// # Errors
    /// Returns [`ModelError::Schema`] for an empty column list, a duplicate
    /// column name, an optional unique column, or more than one unique column.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> ModelResult<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(ModelError::schema(name, "no columns declared"));
        }

        let mut seen = HashSet::new();
        let mut definitions = Vec::with_capacity(columns.len());
        let mut key = None;
        for (index, column) in columns.iter().enumerate() {
            if !seen.insert(column.name) {
                return Err(ModelError::schema(
                    name,
                    format!("duplicate column {}", column.name),
                ));
            }
            let definition = column
                .compile()
                .map_err(|reason| ModelError::schema(&name, reason))?;
            definitions.push(definition);
            if column.unique {
                if key.is_some() {
                    return Err(ModelError::schema(name, "more than one unique column"));
                }
                key = Some(index);
            }
        }

        Ok(Self {
            name,
            columns,
            definitions,
            key,
        })
    }

    /// Schema declared by record type `R`
    ///
    /// # Errors
    /// See [`TableSchema::new`].
    pub fn of<R: Record>() -> ModelResult<Self> {
        Self::new(R::table_name(), R::columns())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The unique column, if one is declared
    #[must_use]
    pub fn key(&self) -> Option<&Column> {
        self.key.map(|index| &self.columns[index])
    }

    #[must_use]
    pub fn key_position(&self) -> Option<usize> {
        self.key
    }

    /// Quoted column names in declaration order, for `SELECT` lists
    #[must_use]
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote(c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .zip(&self.definitions)
            .map(|(column, definition)| format!("{} {definition}", quote(column.name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({columns})", quote(&self.name))
    }
}

/// Quote an identifier for SQLite
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// One result row, positioned by the schema's declaration order
#[derive(Debug)]
pub struct Row<'s> {
    schema: &'s TableSchema,
    values: Vec<Value>,
}

impl<'s> Row<'s> {
    /// # Errors
    /// Returns [`ModelError::Decode`] if the arity does not match the schema.
    pub fn new(schema: &'s TableSchema, values: Vec<Value>) -> ModelResult<Self> {
        if values.len() != schema.columns().len() {
            return Err(ModelError::Decode(format!(
                "{} expects {} columns, row has {}",
                schema.name(),
                schema.columns().len(),
                values.len()
            )));
        }
        Ok(Self { schema, values })
    }

    /// Take the value of `column`, leaving `NULL` in its place
    ///
    /// # Errors
    /// Returns [`ModelError::Decode`] for an undeclared column or a type mismatch.
    pub fn take<T: FromValue>(&mut self, column: &str) -> ModelResult<T> {
        let index = self.schema.position(column).ok_or_else(|| {
            ModelError::Decode(format!("{} has no column {column}", self.schema.name()))
        })?;
        let value = std::mem::replace(&mut self.values[index], Value::Null);
        T::from_value(value).map_err(|e| match e {
            ModelError::Decode(reason) => {
                ModelError::Decode(format!("{}.{column}: {reason}", self.schema.name()))
            }
            other => other,
        })
    }
}

/// Create the table for `schema` unless the catalog already lists it.
///
/// Returns whether a `CREATE TABLE` statement was issued.
///
/// # Errors
/// Store errors are returned unchanged.
pub async fn ensure_table(store: &dyn Store, schema: &TableSchema) -> ModelResult<bool> {
    let existing = store
        .fetch_all(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            &[],
        )
        .await?;
    let exists = existing
        .iter()
        .any(|row| matches!(row.first(), Some(Value::Text(name)) if name == schema.name()));
    if exists {
        debug!(target: MODEL_TARGET, table = %schema.name(), "Table already present");
        return Ok(false);
    }

    store.execute(&schema.create_statement(), &[]).await?;
    info!(
        target: MODEL_TARGET,
        table = %schema.name(),
        columns = schema.columns().len(),
        "Created table"
    );
    Ok(true)
}

/// Record schemas known to the process, in registration order
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<TableSchema>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register the schema of `R`. Registering a table name
    /// twice keeps the first registration.
    ///
    /// # Errors
    /// Returns [`ModelError::Schema`] if the declaration is invalid.
    pub fn register<R: Record>(&mut self) -> ModelResult<&TableSchema> {
        let schema = TableSchema::of::<R>()?;
        let index = match self.schemas.iter().position(|s| s.name() == schema.name()) {
            Some(index) => index,
            None => {
                self.schemas.push(schema);
                self.schemas.len() - 1
            }
        };
        Ok(&self.schemas[index])
    }

    #[must_use]
    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.iter().find(|s| s.name() == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.schemas.iter()
    }

    /// Provision every registered table, returning the names that were created
    ///
    /// # Errors
    /// Stops at the first store error.
    pub async fn ensure_all(&self, store: &dyn Store) -> ModelResult<Vec<String>> {
        let mut created = Vec::new();
        for schema in &self.schemas {
            if ensure_table(store, schema).await? {
                created.push(schema.name().to_owned());
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MockStore, SqliteStore};

    struct Ticket {
        owner: u64,
        topic: String,
    }

    impl Record for Ticket {
        fn columns() -> Vec<Column> {
            vec![Column::integer("owner").unique(), Column::text("topic")]
        }

        fn from_row(mut row: Row<'_>) -> ModelResult<Self> {
            Ok(Self {
                owner: row.take("owner")?,
                topic: row.take("topic")?,
            })
        }

        fn to_values(&self) -> Vec<Value> {
            vec![self.owner.into(), self.topic.clone().into()]
        }
    }

    struct Broken;

    impl Record for Broken {
        const TABLE_NAME: Option<&'static str> = Some("broken_things");

        fn columns() -> Vec<Column> {
            vec![Column::integer("id").optional().unique()]
        }

        fn from_row(_row: Row<'_>) -> ModelResult<Self> {
            Ok(Self)
        }

        fn to_values(&self) -> Vec<Value> {
            Vec::new()
        }
    }

    #[test]
    fn test_table_name_defaults_to_lowercase_type_name() {
        assert_eq!(Ticket::table_name(), "ticket");
        assert_eq!(Broken::table_name(), "broken_things");
    }

    #[test]
    fn test_create_statement_keeps_declaration_order() {
        let schema = TableSchema::of::<Ticket>().unwrap();
        assert_eq!(
            schema.create_statement(),
            "CREATE TABLE \"ticket\" (\"owner\" INTEGER NOT NULL PRIMARY KEY, \"topic\" TEXT NOT NULL)"
        );
        assert_eq!(schema.select_list(), "\"owner\", \"topic\"");
        assert_eq!(schema.key().map(|c| c.name), Some("owner"));
    }

    #[test]
    fn test_invalid_schemas() {
        let err = TableSchema::new("t", vec![]).unwrap_err();
        assert!(matches!(err, ModelError::Schema { .. }));

        let err = TableSchema::new("t", vec![Column::integer("a"), Column::text("a")]).unwrap_err();
        assert!(err.to_string().contains("duplicate column a"));

        let err = TableSchema::new(
            "t",
            vec![Column::integer("a").unique(), Column::integer("b").unique()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than one unique column"));
    }

    #[tokio::test]
    async fn test_optional_unique_fails_before_any_statement() {
        // No expectations: any store call would panic
        let store = MockStore::new();
        let mut registry = SchemaRegistry::new();
        let err = registry.register::<Broken>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid schema for table broken_things: Unique keys can not be optional"
        );
        assert!(registry.ensure_all(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut registry = SchemaRegistry::new();
        registry.register::<Ticket>().unwrap();
        registry.register::<Ticket>().unwrap();
        assert_eq!(registry.iter().count(), 1);

        assert_eq!(registry.ensure_all(&store).await.unwrap(), vec!["ticket"]);
        assert!(registry.ensure_all(&store).await.unwrap().is_empty());

        let schema = registry.get("ticket").unwrap();
        assert!(!ensure_table(&store, schema).await.unwrap());

        let tables = store
            .fetch_all("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
            .await
            .unwrap();
        assert_eq!(tables, vec![vec![Value::Text("ticket".to_string())]]);
    }

    #[tokio::test]
    async fn test_ensure_table_skips_when_catalog_lists_it() {
        let mut store = MockStore::new();
        store
            .expect_fetch_all()
            .times(1)
            .returning(|_, _| Ok(vec![vec![Value::Text("ticket".to_string())]]));
        store.expect_execute().times(0);

        let schema = TableSchema::of::<Ticket>().unwrap();
        assert!(!ensure_table(&store, &schema).await.unwrap());
    }

    #[test]
    fn test_row_arity_checked() {
        let schema = TableSchema::of::<Ticket>().unwrap();
        let err = Row::new(&schema, vec![Value::Integer(1)]).unwrap_err();
        assert!(matches!(err, ModelError::Decode(_)));

        let row = Row::new(&schema, vec![Value::Integer(1), Value::Text("help".into())]).unwrap();
        let ticket = Ticket::from_row(row).unwrap();
        assert_eq!(ticket.owner, 1);
        assert_eq!(ticket.topic, "help");
    }
}
