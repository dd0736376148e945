//! Keyword search and scope selection, composed onto a [`Query`].
//!
//! Nothing here touches storage; the result goes to a backend as is.

use chrono::{DateTime, NaiveDate};
use serde_json::{Number, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{allowed, AdminContext, Target, Verb};
use crate::backend::{ColumnRef, Join, JoinKind, Predicate, Query};
use crate::registry::{Hop, Registry, ResolvedPath};
use crate::resource::{Cardinality, FieldKind, MetaKind, Resource, Scope};

/// Alias for the join reached after `depth + 1` hops of `path`.
fn join_alias(path: &str, depth: usize) -> String {
    path.split('.').take(depth + 1).collect::<Vec<_>>().join("__")
}

fn hop_join(path: &str, depth: usize, hop: &Hop<'_>) -> Option<Join> {
    let association = hop.meta.association()?;
    let (kind, parent_key, child_key) = match association.cardinality {
        Cardinality::One => (
            JoinKind::BelongsTo,
            hop.meta.column()?.to_string(),
            hop.to.primary_key().to_string(),
        ),
        Cardinality::Many => (
            JoinKind::HasMany,
            hop.from.primary_key().to_string(),
            association.foreign_key.clone(),
        ),
    };
    Some(Join {
        alias: join_alias(path, depth),
        parent: depth.checked_sub(1).map(|d| join_alias(path, d)),
        table: hop.to.table().to_string(),
        kind,
        parent_key,
        child_key,
    })
}

/// Predicate for one search attribute, or `None` when the keyword can't
/// apply to its kind.
fn keyword_predicate(kind: Option<&FieldKind>, column: ColumnRef, keyword: &str) -> Option<Predicate> {
    match kind {
        None | Some(FieldKind::String | FieldKind::Text | FieldKind::Enum(_)) => {
            Some(Predicate::contains(column, keyword))
        }
        Some(FieldKind::Integer) => keyword
            .parse::<i64>()
            .ok()
            .map(|n| Predicate::eq(column, n)),
        Some(FieldKind::Float | FieldKind::Decimal) => keyword
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(|n| Predicate::eq(column, Value::Number(n))),
        Some(FieldKind::Date) => NaiveDate::parse_from_str(keyword, "%Y-%m-%d")
            .ok()
            .map(|d| Predicate::eq(column, d.format("%Y-%m-%d").to_string())),
        Some(FieldKind::DateTime) => DateTime::parse_from_rfc3339(keyword)
            .ok()
            .map(|ts| Predicate::eq(column, ts.to_rfc3339())),
        Some(FieldKind::Uuid) => Uuid::parse_str(keyword)
            .ok()
            .map(|id| Predicate::eq(column, id.to_string())),
        Some(_) => None,
    }
}

/// Searchable paths: the declared ones, or every textual column that is
/// not a password.
fn search_paths(resource: &Resource) -> Vec<String> {
    if !resource.search_paths().is_empty() {
        return resource.search_paths().to_vec();
    }
    resource
        .metas()
        .iter()
        .filter(|m| m.column().is_some() && m.kind() != MetaKind::Password)
        .filter(|m| matches!(m.field_kind(), Some(FieldKind::String | FieldKind::Text)))
        .map(|m| m.name().to_string())
        .collect()
}

/// Whether the roles may read every meta along `resolved`.
fn readable(resolved: &ResolvedPath<'_>, ctx: &AdminContext) -> bool {
    resolved
        .via
        .iter()
        .all(|hop| allowed(&ctx.roles, Verb::Read, Target::Meta(hop.from, hop.meta)))
        && allowed(&ctx.roles, Verb::Read, Target::Meta(resolved.owner, resolved.meta))
}

/// ORs the keyword across the resource's search attributes, adding the joins
/// dotted paths need. Paths the roles may not read are left out.
pub fn apply_keyword(
    registry: &Registry,
    resource: &Resource,
    mut query: Query,
    keyword: &str,
    ctx: &AdminContext,
) -> Query {
    let mut predicates = Vec::new();

    for path in search_paths(resource) {
        let Some(resolved) = registry.resolve_path(resource, &path) else {
            warn!("Search path {} no longer resolves on {}", path, resource.name());
            continue;
        };
        if !readable(&resolved, ctx) {
            debug!("Skipping unreadable search path {} on {}", path, resource.name());
            continue;
        }
        let Some(column) = resolved.meta.column() else {
            continue;
        };

        let mut complete = true;
        for (depth, hop) in resolved.via.iter().enumerate() {
            match hop_join(&path, depth, hop) {
                Some(join) => query = query.join(join),
                None => complete = false,
            }
        }
        if !complete {
            continue;
        }

        let column = match resolved.via.len() {
            0 => ColumnRef::base(column),
            depth => ColumnRef::joined(join_alias(&path, depth - 1), column),
        };
        if let Some(predicate) = keyword_predicate(resolved.meta.field_kind(), column, keyword) {
            predicates.push(predicate);
        }
    }

    query.filter(Predicate::any(predicates))
}

/// Scopes to apply for the selected names, in application order.
///
/// Ungrouped selections all apply; within a group the last selection wins.
/// Default scopes fill in for groups with no selection, and ungrouped
/// defaults always apply. Unknown names are skipped.
pub fn resolve_scopes<'a>(resource: &'a Resource, selected: &[String]) -> Vec<&'a Scope> {
    let mut ungrouped: Vec<&Scope> = Vec::new();
    let mut groups: Vec<(&str, &Scope)> = Vec::new();

    for name in selected {
        let Some(scope) = resource.scope_named(name) else {
            warn!("Ignoring unknown scope {} on {}", name, resource.name());
            continue;
        };
        match scope.group_name() {
            Some(group) => match groups.iter_mut().find(|(g, _)| *g == group) {
                Some(slot) => slot.1 = scope,
                None => groups.push((group, scope)),
            },
            None => {
                if !ungrouped.iter().any(|s| s.name() == scope.name()) {
                    ungrouped.push(scope);
                }
            }
        }
    }

    for scope in resource.scopes().iter().filter(|s| s.is_default()) {
        match scope.group_name() {
            Some(group) if !groups.iter().any(|(g, _)| *g == group) => groups.push((group, scope)),
            Some(_) => {}
            None if !ungrouped.iter().any(|s| s.name() == scope.name()) => ungrouped.push(scope),
            None => {}
        }
    }

    ungrouped.into_iter().chain(groups.into_iter().map(|(_, s)| s)).collect()
}

/// Composes keyword and scopes onto `base`.
///
/// A custom search handler replaces keyword handling completely.
pub fn build_query(
    registry: &Registry,
    resource: &Resource,
    keyword: Option<&str>,
    selected: &[String],
    base: Query,
    ctx: &AdminContext,
) -> Query {
    let mut query = base;

    for scope in resolve_scopes(resource, selected) {
        debug!("Applying scope {} to {}", scope.name(), resource.name());
        query = scope.apply(query, ctx);
    }

    if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
        query = match resource.custom_search() {
            Some(handler) => handler(query, keyword, ctx),
            None => apply_keyword(registry, resource, query, keyword, ctx),
        };
    }

    debug!("Composed query for {}: {:?}", resource.name(), query);
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_aliases_follow_path_segments() {
        assert_eq!(join_alias("category.name", 0), "category");
        assert_eq!(join_alias("customer.country.name", 1), "customer__country");
    }

    #[test]
    fn keyword_predicates_by_kind() {
        let text = keyword_predicate(Some(&FieldKind::String), "name".into(), "Tea");
        assert_eq!(text, Some(Predicate::contains("name", "Tea")));

        let number = keyword_predicate(Some(&FieldKind::Integer), "stock".into(), "12");
        assert_eq!(number, Some(Predicate::eq("stock", 12)));
        assert_eq!(keyword_predicate(Some(&FieldKind::Integer), "stock".into(), "tea"), None);

        assert_eq!(keyword_predicate(Some(&FieldKind::Boolean), "active".into(), "true"), None);
        assert!(keyword_predicate(Some(&FieldKind::Date), "placed_on".into(), "2024-05-01").is_some());
    }
}
