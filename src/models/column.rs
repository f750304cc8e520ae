//! Column descriptors and typed predicates

use crate::models::Value;
use derive_more::Display;
use std::fmt;
use std::marker::PhantomData;

/// Storage affinity of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ColumnType {
    #[display("INTEGER")]
    Integer,
    #[display("TEXT")]
    Text,
}

/// Declaration of one column of a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub optional: bool,
    /// Raw SQL literal used as the column default
    pub default: Option<&'static str>,
    pub unique: bool,
}

impl Column {
    #[must_use]
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            default: None,
            unique: false,
        }
    }

    #[must_use]
    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn with_default(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }

    /// Compile into the column definition used by `CREATE TABLE`:
    /// `<type> [NOT NULL] [DEFAULT <value>] [PRIMARY KEY]`
    ///
    /// # Errors
    /// Returns the reason when the column is both optional and unique.
    pub fn compile(&self) -> Result<String, &'static str> {
        if self.unique && self.optional {
            return Err("Unique keys can not be optional");
        }

        let mut text = self.ty.to_string();
        if !self.optional {
            text.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            text.push_str(" DEFAULT ");
            text.push_str(default);
        }
        if self.unique {
            text.push_str(" PRIMARY KEY");
        }
        Ok(text)
    }
}

/// Typed handle to a column of record `R` holding values of type `T`.
///
/// Handles are declared as associated constants on the record and are the
/// only way to build a [`Predicate`].
pub struct Field<R, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (R, T)>,
}

impl<R, T> Field<R, T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<R, T: Into<Value>> Field<R, T> {
    /// Equality predicate `column = value`
    pub fn equals(&self, value: impl Into<T>) -> Predicate<R> {
        let value: T = value.into();
        Predicate::raw(self.name, value)
    }
}

impl<R, T> Clone for Field<R, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, T> Copy for Field<R, T> {}

impl<R, T> fmt::Debug for Field<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Equality condition over one column of `R`
pub struct Predicate<R> {
    pub column: &'static str,
    pub value: Value,
    _record: PhantomData<fn() -> R>,
}

impl<R> Predicate<R> {
    /// Untyped constructor, checked against the schema at query time
    #[must_use]
    pub fn raw(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
            _record: PhantomData,
        }
    }
}

impl<R> Clone for Predicate<R> {
    fn clone(&self) -> Self {
        Self::raw(self.column, self.value.clone())
    }
}

impl<R> fmt::Debug for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?}", self.column, self.value)
    }
}

/// Row selection accepted by `find`, `find_one` and `delete`
pub enum Query<R> {
    /// Equality match against the table's unique column
    Key(Value),
    /// Conjunction of equality predicates
    All(Vec<Predicate<R>>),
}

impl<R> Query<R> {
    pub fn key(value: impl Into<Value>) -> Self {
        Self::Key(value.into())
    }
}

impl<R> From<Predicate<R>> for Query<R> {
    fn from(predicate: Predicate<R>) -> Self {
        Self::All(vec![predicate])
    }
}

impl<R> From<Vec<Predicate<R>>> for Query<R> {
    fn from(predicates: Vec<Predicate<R>>) -> Self {
        Self::All(predicates)
    }
}

impl<R, const N: usize> From<[Predicate<R>; N]> for Query<R> {
    fn from(predicates: [Predicate<R>; N]) -> Self {
        Self::All(predicates.into())
    }
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(value) => f.debug_tuple("Key").field(value).finish(),
            Self::All(predicates) => f.debug_tuple("All").field(predicates).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ticket;

    #[test]
    fn test_compile_column() {
        assert_eq!(Column::integer("owner").compile().unwrap(), "INTEGER NOT NULL");
        assert_eq!(
            Column::integer("owner").unique().compile().unwrap(),
            "INTEGER NOT NULL PRIMARY KEY"
        );
        assert_eq!(Column::text("reason").optional().compile().unwrap(), "TEXT");
        assert_eq!(
            Column::text("state").with_default("'open'").compile().unwrap(),
            "TEXT NOT NULL DEFAULT 'open'"
        );
    }

    #[test]
    fn test_optional_unique_rejected() {
        let err = Column::integer("owner").optional().unique().compile().unwrap_err();
        assert_eq!(err, "Unique keys can not be optional");
    }

    #[test]
    fn test_field_builds_predicate() {
        const OWNER: Field<Ticket, u64> = Field::new("owner");
        let predicate = OWNER.equals(7u64);
        assert_eq!(predicate.column, "owner");
        assert_eq!(predicate.value, Value::Integer(7));

        let query: Query<Ticket> = [OWNER.equals(1u64), Predicate::raw("topic", "help")].into();
        assert!(matches!(query, Query::All(ref p) if p.len() == 2));
    }
}
