//! Backend-neutral query description.
//!
//! The engine composes a [`Query`] from search keywords, scopes, sorting and
//! pagination; a [`Backend`](super::Backend) decides how to execute it.

use serde::Serialize;
use serde_json::Value;

/// A column, optionally qualified by a join alias. `alias: None` means the
/// base table of the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub alias: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn base(column: impl Into<String>) -> Self {
        Self {
            alias: None,
            column: column.into(),
        }
    }

    pub fn joined(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            column: column.into(),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(column: &str) -> Self {
        ColumnRef::base(column)
    }
}

impl From<String> for ColumnRef {
    fn from(column: String) -> Self {
        ColumnRef::base(column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Eq { column: ColumnRef, value: Value },
    Ne { column: ColumnRef, value: Value },
    Gt { column: ColumnRef, value: Value },
    Lt { column: ColumnRef, value: Value },
    In { column: ColumnRef, values: Vec<Value> },
    /// Case-insensitive substring match.
    Contains { column: ColumnRef, needle: String },
    IsNull { column: ColumnRef },
    Not { predicate: Box<Predicate> },
    Any { predicates: Vec<Predicate> },
    All { predicates: Vec<Predicate> },
}

impl Predicate {
    pub fn eq(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn ne(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Predicate::Ne {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn gt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Predicate::Gt {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn lt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Predicate::Lt {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in(column: impl Into<ColumnRef>, values: Vec<Value>) -> Self {
        Predicate::In {
            column: column.into(),
            values,
        }
    }

    pub fn contains(column: impl Into<ColumnRef>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column: column.into(),
            needle: needle.into(),
        }
    }

    pub fn is_null(column: impl Into<ColumnRef>) -> Self {
        Predicate::IsNull {
            column: column.into(),
        }
    }

    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not {
            predicate: Box::new(predicate),
        }
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Predicate::Any { predicates }
    }

    pub fn all(predicates: Vec<Predicate>) -> Self {
        Predicate::All { predicates }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// `parent.local_key = alias.primary_key`
    BelongsTo,
    /// `parent.primary_key = alias.foreign_key`
    HasMany,
}

/// Join to an associated table, used by dotted search paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub alias: String,
    /// Alias of the joined-from side; `None` is the base table.
    pub parent: Option<String>,
    pub table: String,
    pub kind: JoinKind,
    /// Column on the parent side.
    pub parent_key: String,
    /// Column on the joined side.
    pub child_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub table: String,
    pub primary_key: String,
    pub filters: Vec<Predicate>,
    pub joins: Vec<Join>,
    pub order: Vec<(ColumnRef, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            filters: Vec::new(),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// AND a predicate onto the query.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Adds a join unless one with the same alias exists.
    pub fn join(mut self, join: Join) -> Self {
        if !self.joins.iter().any(|j| j.alias == join.alias) {
            self.joins.push(join);
        }
        self
    }

    pub fn order_by(mut self, column: impl Into<ColumnRef>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// 1-based page.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.limit(per_page).offset((page - 1) * per_page)
    }

    pub fn by_id(self, id: &Value) -> Self {
        let pk = self.primary_key.clone();
        self.filter(Predicate::eq(pk.as_str(), id.clone()))
    }

    /// Same filters and joins, no ordering or pagination. Used for counts.
    pub fn unpaged(&self) -> Self {
        Self {
            order: Vec::new(),
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// Whether a has-many join can yield the same base row more than once.
    pub fn needs_distinct(&self) -> bool {
        self.joins.iter().any(|j| j.kind == JoinKind::HasMany)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paginate_is_one_based() {
        let q = Query::new("orders", "id").paginate(3, 20);
        assert_eq!(q.limit, Some(20));
        assert_eq!(q.offset, Some(40));

        let q = Query::new("orders", "id").paginate(0, 20);
        assert_eq!(q.offset, Some(0));
    }

    #[test]
    fn join_is_deduplicated_by_alias() {
        let join = Join {
            alias: "category".into(),
            parent: None,
            table: "categories".into(),
            kind: JoinKind::BelongsTo,
            parent_key: "category_id".into(),
            child_key: "id".into(),
        };
        let q = Query::new("products", "id").join(join.clone()).join(join);
        assert_eq!(q.joins.len(), 1);
        assert!(!q.needs_distinct());
    }

    #[test]
    fn unpaged_keeps_filters() {
        let q = Query::new("orders", "id")
            .filter(Predicate::eq("state", json!("paid")))
            .order_by("id", Direction::Desc)
            .paginate(2, 10)
            .unpaged();
        assert_eq!(q.filters.len(), 1);
        assert!(q.order.is_empty());
        assert_eq!(q.limit, None);
    }
}
