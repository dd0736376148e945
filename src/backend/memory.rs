use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{id_string, loose_eq, Backend, BackendError, ColumnRef, Direction, Predicate, Query, Record, Table};

/// In-process tables. Used by tests and by the demo binary when no database
/// is configured.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

/// A base record plus the records each join alias reaches from it.
struct Row<'a> {
    base: &'a Record,
    joined: HashMap<&'a str, Vec<&'a Record>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends records to a table, creating it if needed.
    pub async fn seed(&self, table: &str, records: impl IntoIterator<Item = Record>) {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .extend(records);
    }

    /// Snapshot of a table, mostly for assertions.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn bind<'a>(tables: &'a HashMap<String, Vec<Record>>, query: &'a Query, base: &'a Record) -> Row<'a> {
        let mut joined: HashMap<&'a str, Vec<&'a Record>> = HashMap::new();

        for join in &query.joins {
            let parents: Vec<&Record> = match &join.parent {
                None => vec![base],
                Some(parent) => joined.get(parent.as_str()).cloned().unwrap_or_default(),
            };
            let candidates = tables.get(&join.table).map(Vec::as_slice).unwrap_or(&[]);

            let mut reached = Vec::new();
            for parent in parents {
                let Some(key) = parent.get(&join.parent_key) else {
                    continue;
                };
                if key.is_null() {
                    continue;
                }
                reached.extend(
                    candidates
                        .iter()
                        .filter(|c| c.get(&join.child_key).is_some_and(|v| loose_eq(v, key))),
                );
            }
            joined.insert(join.alias.as_str(), reached);
        }

        Row { base, joined }
    }

    fn values<'a>(row: &Row<'a>, column: &ColumnRef) -> Vec<&'a Value> {
        match &column.alias {
            None => vec![row.base.get(&column.column).unwrap_or(&Value::Null)],
            Some(alias) => {
                let reached = row.joined.get(alias.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                if reached.is_empty() {
                    return vec![&Value::Null];
                }
                reached
                    .iter()
                    .map(|r| r.get(&column.column).unwrap_or(&Value::Null))
                    .collect()
            }
        }
    }

    fn matches(row: &Row<'_>, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Eq { column, value } => {
                Self::values(row, column).iter().any(|v| loose_eq(v, value))
            }
            Predicate::Ne { column, value } => {
                Self::values(row, column).iter().any(|v| !loose_eq(v, value))
            }
            Predicate::Gt { column, value } => Self::values(row, column)
                .iter()
                .any(|v| !v.is_null() && compare(v, value) == Ordering::Greater),
            Predicate::Lt { column, value } => Self::values(row, column)
                .iter()
                .any(|v| !v.is_null() && compare(v, value) == Ordering::Less),
            Predicate::In { column, values } => Self::values(row, column)
                .iter()
                .any(|v| values.iter().any(|candidate| loose_eq(v, candidate))),
            Predicate::Contains { column, needle } => {
                let needle = needle.to_lowercase();
                Self::values(row, column).iter().any(|v| match v {
                    Value::Null => false,
                    other => id_string(other).to_lowercase().contains(&needle),
                })
            }
            Predicate::IsNull { column } => Self::values(row, column).iter().any(|v| v.is_null()),
            Predicate::Not { predicate } => !Self::matches(row, predicate),
            Predicate::Any { predicates } => predicates.iter().any(|p| Self::matches(row, p)),
            Predicate::All { predicates } => predicates.iter().all(|p| Self::matches(row, p)),
        }
    }

    fn filtered<'a>(tables: &'a HashMap<String, Vec<Record>>, query: &'a Query) -> Result<Vec<Row<'a>>, BackendError> {
        let rows = tables
            .get(&query.table)
            .ok_or_else(|| BackendError::UnknownTable(query.table.clone()))?;

        Ok(rows
            .iter()
            .map(|base| Self::bind(tables, query, base))
            .filter(|row| query.filters.iter().all(|p| Self::matches(row, p)))
            .collect())
    }
}

/// Next integer key when the table uses integer keys, a fresh UUID otherwise.
fn next_key(rows: &[Record], primary_key: &str) -> Value {
    let keys: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.get(primary_key).and_then(Value::as_i64))
        .collect();
    if !keys.is_empty() && keys.iter().all(Option::is_some) {
        let max = keys.into_iter().flatten().max().unwrap_or(0);
        return Value::from(max + 1);
    }
    Value::String(Uuid::new_v4().to_string())
}

/// Nulls first, then numbers, then everything else by its string form.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => {
            let numeric = |v: &Value| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            match (numeric(a), numeric(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => id_string(a).cmp(&id_string(b)),
            }
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_many(&self, query: &Query) -> Result<Vec<Record>, BackendError> {
        let tables = self.tables.read().await;
        let mut rows = Self::filtered(&tables, query)?;

        if !query.order.is_empty() {
            rows.sort_by(|x, y| {
                for (column, direction) in &query.order {
                    let a = Self::values(x, column).first().copied().unwrap_or(&Value::Null);
                    let b = Self::values(y, column).first().copied().unwrap_or(&Value::Null);
                    let ordering = match direction {
                        Direction::Asc => compare(a, b),
                        Direction::Desc => compare(b, a),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| row.base.clone())
            .collect())
    }

    async fn count(&self, query: &Query) -> Result<u64, BackendError> {
        let tables = self.tables.read().await;
        Ok(Self::filtered(&tables, query)?.len() as u64)
    }

    async fn create(&self, table: &Table, mut record: Record) -> Result<Record, BackendError> {
        let missing_key = record
            .get(&table.primary_key)
            .is_none_or(|v| v.is_null() || v == "");
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.name.clone()).or_default();

        if missing_key {
            record.insert(table.primary_key.clone(), next_key(rows, &table.primary_key));
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: &Table, id: &Value, fields: Record) -> Result<Record, BackendError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(&table.name)
            .ok_or_else(|| BackendError::UnknownTable(table.name.clone()))?;

        let row = rows
            .iter_mut()
            .find(|r| r.get(&table.primary_key).is_some_and(|v| loose_eq(v, id)))
            .ok_or_else(|| BackendError::NotFound {
                table: table.name.clone(),
                id: id_string(id),
            })?;

        for (key, value) in fields {
            if key != table.primary_key {
                row.insert(key, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &Table, id: &Value) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&table.name) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| !r.get(&table.primary_key).is_some_and(|v| loose_eq(v, id)));
        Ok(rows.len() != before)
    }
}
