//! Typed CRUD over one record table

use crate::MODEL_TARGET;
use crate::models::schema::quote;
use crate::models::{
    ModelError, ModelResult, Query, Record, Row, Store, TableSchema, Value, ensure_table,
};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Handle to the table backing record type `R`
pub struct Table<R> {
    schema: Arc<TableSchema>,
    store: Arc<dyn Store>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.schema.name())
            .finish_non_exhaustive()
    }
}

impl<R: Record> Table<R> {
    /// Bind `R` to `store`. The schema is validated here; nothing is executed.
    ///
    /// # Errors
    /// Returns [`ModelError::Schema`] if `R` declares an invalid schema.
    pub fn new(store: Arc<dyn Store>) -> ModelResult<Self> {
        Ok(Self::with_schema(store, TableSchema::of::<R>()?))
    }

    /// Bind `R` to an already validated schema
    #[must_use]
    pub fn with_schema(store: Arc<dyn Store>, schema: TableSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Create the backing table if the catalog does not list it
    ///
    /// # Errors
    /// Store errors are returned unchanged.
    pub async fn ensure(&self) -> ModelResult<bool> {
        ensure_table(self.store.as_ref(), &self.schema).await
    }

    /// Insert one row from (column, value) pairs. A repeated column keeps its
    /// last value. Omitted optional columns take the column default.
    ///
    /// # Errors
    /// Returns [`ModelError::MissingColumns`] or [`ModelError::UnknownColumns`]
    /// before any statement is issued.
    pub async fn create<I, K>(&self, fields: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut supplied: Vec<(String, Value)> = Vec::new();
        for (name, value) in fields {
            let name = name.as_ref();
            match supplied.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value,
                None => supplied.push((name.to_owned(), value)),
            }
        }

        let missing: Vec<String> = self
            .schema
            .columns()
            .iter()
            .filter(|c| !c.optional && !supplied.iter().any(|(n, _)| n == c.name))
            .map(|c| c.name.to_owned())
            .collect();
        if !missing.is_empty() {
            return Err(ModelError::MissingColumns {
                table: self.schema.name().to_owned(),
                columns: missing,
            });
        }

        let unknown: Vec<String> = supplied
            .iter()
            .filter(|(n, _)| self.schema.column(n).is_none())
            .map(|(n, _)| n.clone())
            .collect();
        if !unknown.is_empty() {
            return Err(self.unknown(unknown));
        }

        let (names, values): (Vec<String>, Vec<Value>) = supplied.into_iter().unzip();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(self.schema.name()),
            names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(", "),
            vec!["?"; values.len()].join(", ")
        );
        self.store.execute(&sql, &values).await?;
        Ok(())
    }

    /// Insert `record`, leaving `NULL` optional columns to their default
    ///
    /// # Errors
    /// See [`Table::create`].
    pub async fn insert(&self, record: &R) -> ModelResult<()> {
        let fields: Vec<(&'static str, Value)> = self
            .schema
            .columns()
            .iter()
            .zip(record.to_values())
            .filter(|(column, value)| !(column.optional && value.is_null()))
            .map(|(column, value)| (column.name, value))
            .collect();
        self.create(fields).await
    }

    /// Every row, in storage order
    ///
    /// # Errors
    /// Store or decode errors.
    pub async fn find_all(&self) -> ModelResult<Vec<R>> {
        let sql = format!(
            "SELECT {} FROM {}",
            self.schema.select_list(),
            quote(self.schema.name())
        );
        let rows = self.store.fetch_all(&sql, &[]).await?;
        self.materialize(rows)
    }

    /// Rows matching `query`, in storage order
    ///
    /// # Errors
    /// [`ModelError::NoPrimaryKey`], [`ModelError::EmptyQuery`] or
    /// [`ModelError::UnknownColumns`] for an unusable query; store or decode
    /// errors otherwise.
    pub async fn find(&self, query: impl Into<Query<R>>) -> ModelResult<Vec<R>> {
        let (clause, values) = self.where_clause(query.into())?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {clause}",
            self.schema.select_list(),
            quote(self.schema.name())
        );
        let rows = self.store.fetch_all(&sql, &values).await?;
        self.materialize(rows)
    }

    /// First row matching `query`, if any
    ///
    /// # Errors
    /// See [`Table::find`].
    pub async fn first(&self, query: impl Into<Query<R>>) -> ModelResult<Option<R>> {
        let (clause, values) = self.where_clause(query.into())?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {clause} LIMIT 1",
            self.schema.select_list(),
            quote(self.schema.name())
        );
        let rows = self.store.fetch_all(&sql, &values).await?;
        Ok(self.materialize(rows)?.into_iter().next())
    }

    /// First row matching `query`
    ///
    /// # Errors
    /// Returns [`ModelError::NotFound`] when nothing matches.
    pub async fn find_one(&self, query: impl Into<Query<R>>) -> ModelResult<R> {
        self.first(query)
            .await?
            .ok_or_else(|| ModelError::NotFound(self.schema.name().to_owned()))
    }

    /// Row whose unique column equals `key`
    ///
    /// # Errors
    /// Returns [`ModelError::NoPrimaryKey`] if the table declares no unique column.
    pub async fn get(&self, key: impl Into<Value>) -> ModelResult<Option<R>> {
        self.first(Query::<R>::Key(key.into())).await
    }

    /// Delete every row matching `query`, returning how many were removed
    ///
    /// # Errors
    /// See [`Table::find`].
    pub async fn delete(&self, query: impl Into<Query<R>>) -> ModelResult<u64> {
        let (clause, values) = self.where_clause(query.into())?;
        let sql = format!("DELETE FROM {} WHERE {clause}", quote(self.schema.name()));
        let removed = self.store.execute(&sql, &values).await?;
        debug!(target: MODEL_TARGET, table = %self.schema.name(), removed, "Deleted rows");
        Ok(removed)
    }

    /// Delete the row holding `record`'s unique key
    ///
    /// # Errors
    /// Returns [`ModelError::NoPrimaryKey`] if the table declares no unique column.
    pub async fn delete_row(&self, record: &R) -> ModelResult<u64> {
        let position = self
            .schema
            .key_position()
            .ok_or_else(|| ModelError::NoPrimaryKey(self.schema.name().to_owned()))?;
        let key = record
            .to_values()
            .into_iter()
            .nth(position)
            .ok_or_else(|| {
                ModelError::Decode(format!("{} record is missing its key", self.schema.name()))
            })?;
        self.delete(Query::<R>::Key(key)).await
    }

    fn unknown(&self, columns: Vec<String>) -> ModelError {
        ModelError::UnknownColumns {
            table: self.schema.name().to_owned(),
            columns,
        }
    }

    fn where_clause(&self, query: Query<R>) -> ModelResult<(String, Vec<Value>)> {
        match query {
            Query::Key(value) => {
                let key = self
                    .schema
                    .key()
                    .ok_or_else(|| ModelError::NoPrimaryKey(self.schema.name().to_owned()))?;
                Ok((format!("{} = ?", quote(key.name)), vec![value]))
            }
            Query::All(predicates) => {
                if predicates.is_empty() {
                    return Err(ModelError::EmptyQuery(self.schema.name().to_owned()));
                }
                let unknown: Vec<String> = predicates
                    .iter()
                    .filter(|p| self.schema.column(p.column).is_none())
                    .map(|p| p.column.to_owned())
                    .collect();
                if !unknown.is_empty() {
                    return Err(self.unknown(unknown));
                }

                let clause = predicates
                    .iter()
                    .map(|p| format!("{} = ?", quote(p.column)))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let values = predicates.into_iter().map(|p| p.value).collect();
                Ok((clause, values))
            }
        }
    }

    fn materialize(&self, rows: Vec<Vec<Value>>) -> ModelResult<Vec<R>> {
        rows.into_iter()
            .map(|values| R::from_row(Row::new(&self.schema, values)?))
            .collect()
    }
}
