pub mod memory;
pub mod query;
pub mod sea;

pub use memory::*;
pub use query::*;
pub use sea::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resource::Resource;

/// A persisted row as seen by the admin: column name to JSON value.
pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Record {id} not found in {table}")]
    NotFound { table: String, id: String },

    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

/// Where a record lives: table plus primary key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub primary_key: String,
}

impl Table {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
        }
    }
}

impl From<&Resource> for Table {
    fn from(resource: &Resource) -> Self {
        Table::new(resource.table(), resource.primary_key())
    }
}

/// Persistence capability consumed by the engine.
///
/// The engine only composes [`Query`] values and submits them here; it never
/// issues storage commands itself. Implementations own connection pooling and
/// transactional boundaries.
#[async_trait]
pub trait Backend: Send + Sync {
    fn query(&self, resource: &Resource) -> Query {
        Query::new(resource.table(), resource.primary_key())
    }

    async fn fetch_many(&self, query: &Query) -> Result<Vec<Record>, BackendError>;

    async fn fetch_one(&self, query: &Query) -> Result<Option<Record>, BackendError> {
        let query = query.clone().limit(1);
        Ok(self.fetch_many(&query).await?.into_iter().next())
    }

    async fn count(&self, query: &Query) -> Result<u64, BackendError>;

    /// Inserts a record and returns it as stored, including generated keys.
    async fn create(&self, table: &Table, record: Record) -> Result<Record, BackendError>;

    /// Writes `fields` onto the record with primary key `id`.
    async fn update(&self, table: &Table, id: &Value, fields: Record)
    -> Result<Record, BackendError>;

    /// Returns whether a record was removed.
    async fn delete(&self, table: &Table, id: &Value) -> Result<bool, BackendError>;
}

/// Renders a JSON scalar the way it would appear in a URL segment.
pub fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Loose equality between JSON scalars: `5`, `5.0` and `"5"` compare equal.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(_), _) | (_, Value::Array(_)) => a == b,
        (Value::Object(_), _) | (_, Value::Object(_)) => a == b,
        _ => id_string(a) == id_string(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_eq_crosses_number_and_string() {
        assert!(loose_eq(&json!(5), &json!("5")));
        assert!(loose_eq(&json!(5), &json!(5.0)));
        assert!(loose_eq(&json!(true), &json!("true")));
        assert!(!loose_eq(&json!(null), &json!("")));
        assert!(!loose_eq(&json!("a"), &json!("b")));
    }
}
