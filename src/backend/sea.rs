//! SQL backend on top of `sea-orm`.
//!
//! Queries are compiled to `sea-query` statements and rows come back as JSON
//! objects, so any table the admin knows about can be served without a
//! generated entity.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use sea_orm::sea_query::{
    Alias, Asterisk, Condition, Expr, Func, JoinType, Order, Query as SqlQuery, SelectStatement,
    SimpleExpr, Value as SqlValue,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, JsonValue, Statement};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{Backend, BackendError, ColumnRef, Direction, Predicate, Query, Record, Table};

#[derive(Clone)]
pub struct SeaOrmBackend {
    db: DatabaseConnection,
}

impl SeaOrmBackend {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn build<S: sea_orm::StatementBuilder>(&self, statement: &S) -> Statement {
        let stmt = self.db.get_database_backend().build(statement);
        debug!("🗄️ {}", stmt);
        stmt
    }

    async fn rows(&self, stmt: Statement) -> Result<Vec<Record>, BackendError> {
        let rows = JsonValue::find_by_statement(stmt).all(&self.db).await?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    /// SELECT with joins and WHERE applied, no projection yet.
    fn filtered_select(query: &Query) -> SelectStatement {
        let mut select = SqlQuery::select();
        select.from(Alias::new(&query.table));

        for join in &query.joins {
            let parent = join.parent.clone().unwrap_or_else(|| query.table.clone());
            select.join_as(
                JoinType::LeftJoin,
                Alias::new(&join.table),
                Alias::new(&join.alias),
                Expr::col((Alias::new(parent), Alias::new(&join.parent_key)))
                    .equals((Alias::new(&join.alias), Alias::new(&join.child_key))),
            );
        }

        let mut condition = Condition::all();
        for predicate in &query.filters {
            condition = condition.add(to_condition(query, predicate));
        }
        select.cond_where(condition);
        select
    }
}

fn into_record(value: JsonValue) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn column(query: &Query, column: &ColumnRef) -> Expr {
    let table = column.alias.clone().unwrap_or_else(|| query.table.clone());
    Expr::col((Alias::new(table), Alias::new(&column.column)))
}

fn as_text(expr: Expr) -> Expr {
    Expr::expr(expr.cast_as(Alias::new("TEXT")))
}

/// Binds JSON as the closest SQL type. Strings that look like uuids or
/// timestamps are sent typed so they compare against typed columns.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::String(None),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => {
            if let Ok(id) = Uuid::parse_str(s) {
                id.into()
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                ts.into()
            } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                date.into()
            } else {
                s.clone().into()
            }
        }
        other => other.clone().into(),
    }
}

fn to_condition(query: &Query, predicate: &Predicate) -> Condition {
    let leaf = |expr: SimpleExpr| Condition::all().add(expr);

    match predicate {
        Predicate::Eq { column: c, value } if value.is_null() => leaf(column(query, c).is_null()),
        Predicate::Eq { column: c, value } => leaf(column(query, c).eq(to_sql(value))),
        Predicate::Ne { column: c, value } if value.is_null() => {
            leaf(column(query, c).is_not_null())
        }
        Predicate::Ne { column: c, value } => leaf(column(query, c).ne(to_sql(value))),
        Predicate::Gt { column: c, value } => leaf(column(query, c).gt(to_sql(value))),
        Predicate::Lt { column: c, value } => leaf(column(query, c).lt(to_sql(value))),
        Predicate::In { column: c, values } => {
            leaf(column(query, c).is_in(values.iter().map(to_sql)))
        }
        Predicate::Contains { column: c, needle } => {
            let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
            leaf(Expr::expr(Func::lower(as_text(column(query, c)))).like(pattern))
        }
        Predicate::IsNull { column: c } => leaf(column(query, c).is_null()),
        Predicate::Not { predicate } => to_condition(query, predicate).not(),
        // Nothing can match an empty disjunction.
        Predicate::Any { predicates } if predicates.is_empty() => leaf(Expr::val(1).eq(0)),
        Predicate::Any { predicates } => predicates
            .iter()
            .fold(Condition::any(), |acc, p| acc.add(to_condition(query, p))),
        Predicate::All { predicates } => predicates
            .iter()
            .fold(Condition::all(), |acc, p| acc.add(to_condition(query, p))),
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl Backend for SeaOrmBackend {
    async fn fetch_many(&self, query: &Query) -> Result<Vec<Record>, BackendError> {
        let mut select = Self::filtered_select(query);
        select.column((Alias::new(&query.table), Asterisk));
        if query.needs_distinct() {
            select.distinct();
        }

        for (c, direction) in &query.order {
            let order = match direction {
                Direction::Asc => Order::Asc,
                Direction::Desc => Order::Desc,
            };
            let table = c.alias.clone().unwrap_or_else(|| query.table.clone());
            select.order_by((Alias::new(table), Alias::new(&c.column)), order);
        }
        if let Some(limit) = query.limit {
            select.limit(limit);
        }
        if let Some(offset) = query.offset {
            select.offset(offset);
        }

        let stmt = self.build(&select);
        self.rows(stmt).await
    }

    async fn count(&self, query: &Query) -> Result<u64, BackendError> {
        let mut keys = Self::filtered_select(query);
        keys.distinct()
            .column((Alias::new(&query.table), Alias::new(&query.primary_key)));

        let mut select = SqlQuery::select();
        select
            .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
            .from_subquery(keys, Alias::new("matched"));

        let stmt = self.build(&select);
        let row = JsonValue::find_by_statement(stmt).one(&self.db).await?;
        Ok(row
            .and_then(|r| r.get("count").and_then(Value::as_u64))
            .unwrap_or(0))
    }

    async fn create(&self, table: &Table, mut record: Record) -> Result<Record, BackendError> {
        if record.get(&table.primary_key).is_none_or(Value::is_null) {
            record.remove(&table.primary_key);
        }

        let mut insert = SqlQuery::insert();
        insert
            .into_table(Alias::new(&table.name))
            .columns(record.keys().map(|k| Alias::new(k.as_str())))
            .values(record.values().map(|v| SimpleExpr::Value(to_sql(v))))
            .map_err(|e| BackendError::Unsupported(e.to_string()))?;
        insert.returning_all();

        let stmt = self.build(&insert);
        self.rows(stmt)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Unsupported("insert returned no row".to_string()))
    }

    async fn update(&self, table: &Table, id: &Value, fields: Record) -> Result<Record, BackendError> {
        let key = Expr::col((Alias::new(&table.name), Alias::new(&table.primary_key)));
        let values: Vec<(Alias, SimpleExpr)> = fields
            .iter()
            .filter(|(k, _)| **k != table.primary_key)
            .map(|(k, v)| (Alias::new(k.as_str()), SimpleExpr::Value(to_sql(v))))
            .collect();

        let not_found = || BackendError::NotFound {
            table: table.name.clone(),
            id: super::id_string(id),
        };

        if values.is_empty() {
            let query = Query::new(&table.name, &table.primary_key).by_id(id);
            return self.fetch_one(&query).await?.ok_or_else(not_found);
        }

        let mut update = SqlQuery::update();
        update
            .table(Alias::new(&table.name))
            .values(values)
            .and_where(key.eq(to_sql(id)))
            .returning_all();

        let stmt = self.build(&update);
        self.rows(stmt).await?.into_iter().next().ok_or_else(not_found)
    }

    async fn delete(&self, table: &Table, id: &Value) -> Result<bool, BackendError> {
        let mut delete = SqlQuery::delete();
        delete
            .from_table(Alias::new(&table.name))
            .and_where(Expr::col(Alias::new(&table.primary_key)).eq(to_sql(id)));

        let stmt = self.build(&delete);
        let result = self.db.execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Join, JoinKind};
    use sea_orm::sea_query::PostgresQueryBuilder;
    use serde_json::json;

    #[test]
    fn compiles_search_with_join_to_sql() {
        let query = Query::new("products", "id")
            .join(Join {
                alias: "category".into(),
                parent: None,
                table: "categories".into(),
                kind: JoinKind::BelongsTo,
                parent_key: "category_id".into(),
                child_key: "id".into(),
            })
            .filter(Predicate::any(vec![
                Predicate::contains("name", "rake"),
                Predicate::contains(ColumnRef::joined("category", "name"), "rake"),
            ]));

        let sql = SeaOrmBackend::filtered_select(&query).to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#"LEFT JOIN "categories" AS "category""#), "{sql}");
        assert!(sql.contains("LIKE '%rake%'"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn binds_uuid_strings_typed() {
        let id = Uuid::new_v4();
        assert!(matches!(to_sql(&json!(id.to_string())), SqlValue::Uuid(_)));
        assert!(matches!(to_sql(&json!("plain")), SqlValue::String(_)));
        assert!(matches!(to_sql(&json!(3)), SqlValue::BigInt(_)));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
