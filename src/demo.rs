//! Storefront admin: the configuration the binary serves, also used by the
//! integration tests.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{Permission, Roles, Subject, Verb};
use crate::backend::{id_string, Direction, MemoryBackend, Predicate, Record};
use crate::entities::{category, customer, order, product};
use crate::error::{AdminResult, FieldError};
use crate::registry::Registry;
use crate::resource::{
    Action, ActionInvocation, ActionMode, ActionOutcome, Attrs, Describe, FieldKind, MetaConfig,
    MetaKind, ModelInfo, Scope,
};

pub const ADMIN: &str = "admin";
pub const STAFF: &str = "staff";

pub const ORDER_STATES: [&str; 4] = ["pending", "paid", "shipped", "cancelled"];
pub const CARRIERS: [&str; 3] = ["dhl", "ups", "fedex"];

/// Argument of the `ship` action.
#[derive(Debug, Deserialize)]
pub struct Shipment {
    pub carrier: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl Describe for Shipment {
    fn describe() -> ModelInfo {
        ModelInfo::new("Shipment")
            .field("carrier", FieldKind::String)
            .field("tracking_number", FieldKind::String)
    }
}

fn state_is(record: &Record, state: &str) -> bool {
    record.get("state").and_then(Value::as_str) == Some(state)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

async fn set_state(invocation: &ActionInvocation, state: &str, extra: Record) -> anyhow::Result<usize> {
    let mut changed = 0;
    for id in invocation.ids() {
        let mut fields = extra.clone();
        fields.insert("state".to_string(), json!(state));
        invocation
            .backend
            .update(&invocation.table, &id, fields)
            .await
            .with_context(|| format!("failed to update order {}", id_string(&id)))?;
        changed += 1;
    }
    Ok(changed)
}

async fn ship(invocation: ActionInvocation) -> anyhow::Result<ActionOutcome> {
    let shipment: Shipment = invocation.argument_as()?;

    let mut extra = Record::new();
    extra.insert("carrier".to_string(), json!(shipment.carrier));
    extra.insert("shipped_at".to_string(), json!(now()));
    let shipped = set_state(&invocation, "shipped", extra).await?;

    Ok(ActionOutcome::new(format!("Shipped {} order(s) with {}", shipped, shipment.carrier))
        .affected(shipped)
        .data(json!({ "tracking_number": shipment.tracking_number })))
}

async fn mark_paid(invocation: ActionInvocation) -> anyhow::Result<ActionOutcome> {
    let paid = set_state(&invocation, "paid", Record::new()).await?;
    Ok(ActionOutcome::new(format!("Marked {} order(s) as paid", paid)).affected(paid))
}

async fn cancel(invocation: ActionInvocation) -> anyhow::Result<ActionOutcome> {
    let cancelled = set_state(&invocation, "cancelled", Record::new()).await?;
    Ok(ActionOutcome::new(format!("Cancelled {} order(s)", cancelled)).affected(cancelled))
}

fn configure_catalog(registry: &mut Registry) {
    registry
        .register::<category::Model>()
        .menu(["Catalog"])
        .index_attrs(["name", "description"])
        .default_order("name", Direction::Asc);

    registry
        .register::<product::Model>()
        .menu(["Catalog"])
        .search_attrs(["name", "code", "category.name"])
        .index_attrs(["name", "code", "category", "price", "active"])
        .edit_attrs(
            Attrs::new()
                .section("Basics", [["name", "code"], ["category", "price"]])
                .section("Details", [vec!["active"], vec!["description"]]),
        )
        .show_attrs(["name", "code", "category", "category.description", "price", "active", "description", "created_at"])
        .scope(
            Scope::new("available", |query, _| query.filter(Predicate::eq("active", true)))
                .group("Availability")
                .default(),
        )
        .scope(
            Scope::new("retired", |query, _| query.filter(Predicate::eq("active", false)))
                .group("Availability"),
        )
        .scope(Scope::new("everything", |query, _| query).group("Availability"))
        .default_order("name", Direction::Asc)
        .validate(|record, _| {
            let negative = record
                .get("price")
                .and_then(Value::as_f64)
                .is_some_and(|price| price < 0.0);
            if negative {
                vec![FieldError::new("price", "must not be negative")]
            } else {
                Vec::new()
            }
        });
}

fn configure_sales(registry: &mut Registry) {
    registry
        .register::<customer::Model>()
        .menu(["Sales"])
        .permission(
            Permission::new()
                .allow_all([ADMIN])
                .allow(Verb::Read, [STAFF]),
        )
        .meta(
            MetaConfig::new("password")
                .kind(MetaKind::Password)
                .permission(Permission::new().allow_all([ADMIN])),
        )
        .meta(MetaConfig::new("email").required(true).setter(|record, value, _| {
            let email = value
                .as_str()
                .map(|e| e.trim().to_lowercase())
                .ok_or_else(|| "must be text".to_string())?;
            if !email.contains('@') {
                return Err("is not an email address".to_string());
            }
            record.insert("email".to_string(), json!(email));
            Ok(())
        }))
        .meta(MetaConfig::new("contact").label("Contact").valuer(|record, _| {
            let name = record.get("name").and_then(Value::as_str).unwrap_or_default();
            let email = record.get("email").and_then(Value::as_str).unwrap_or_default();
            json!(format!("{} <{}>", name, email))
        }))
        .index_attrs(["name", "email", "vip"])
        .show_attrs(["name", "contact", "vip", "orders", "created_at"])
        .edit_attrs(["-created_at"])
        .scope(Scope::new("vip", |query, _| query.filter(Predicate::eq("vip", true))));

    registry
        .register::<Shipment>()
        .invisible()
        .meta(
            MetaConfig::new("carrier")
                .kind(MetaKind::SelectOne)
                .options(CARRIERS)
                .required(true),
        );

    registry
        .register::<order::Model>()
        .menu(["Sales"])
        .theme("sales")
        .title_field("number")
        .meta(
            MetaConfig::new("state")
                .kind(MetaKind::SelectOne)
                .options(ORDER_STATES)
                .required(true),
        )
        .meta(MetaConfig::new("number").required(true))
        .meta(MetaConfig::new("notes").kind(MetaKind::RichText))
        .meta(MetaConfig::new("carrier").readonly(true))
        .meta(MetaConfig::new("shipped_at").readonly(true))
        .meta(MetaConfig::new("created_at").readonly(true))
        .search_attrs(["number", "customer.name", "customer.email"])
        .index_attrs(["number", "customer", "state", "total", "created_at"])
        .edit_attrs(
            Attrs::new()
                .section("Order", [["number", "customer"], ["state", "total"]])
                .section("Notes", [["notes"]]),
        )
        .show_attrs(["number", "customer", "customer.email", "state", "total", "carrier", "shipped_at", "notes", "created_at"])
        .scope(
            Scope::new("Pending", |query, _| query.filter(Predicate::eq("state", "pending")))
                .group("State"),
        )
        .scope(
            Scope::new("Paid", |query, _| query.filter(Predicate::eq("state", "paid")))
                .group("State"),
        )
        .scope(
            Scope::new("Shipped", |query, _| query.filter(Predicate::eq("state", "shipped")))
                .group("State"),
        )
        .scope(
            Scope::new("large", |query, _| query.filter(Predicate::gt("total", 100)))
                .label("Over 100"),
        )
        .default_order("created_at", Direction::Desc)
        .action(
            Action::new("ship", ship)
                .argument::<Shipment>()
                .visible(|record, _| state_is(record, "paid")),
        )
        .action(
            Action::new("mark_paid", mark_paid)
                .modes([ActionMode::BulkIndex])
                .label("Mark as paid")
                .visible(|record, _| state_is(record, "pending")),
        )
        .action(
            Action::new("cancel", cancel)
                .modes([ActionMode::BulkIndex, ActionMode::ShowPage])
                .permission(Permission::new().allow(Verb::Update, [ADMIN]))
                .visible(|record, _| !state_is(record, "shipped") && !state_is(record, "cancelled")),
        );
}

/// Declares every demo resource on `registry`.
pub fn configure(registry: &mut Registry) {
    configure_catalog(registry);
    configure_sales(registry);
}

pub fn registry() -> AdminResult<Arc<Registry>> {
    let mut registry = Registry::new();
    configure(&mut registry);
    registry.finish()
}

/// `admin` for staff addresses, `staff` for anyone signed in.
pub fn roles() -> Roles {
    let mut roles = Roles::new();
    roles
        .register(ADMIN, |subject: &Subject| {
            subject
                .email
                .as_deref()
                .is_some_and(|email| email.ends_with("@freshadmin.dev"))
        })
        .register(STAFF, |_: &Subject| true);
    roles
}

fn rows(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect()
}

/// Fills `backend` with a small storefront.
pub async fn seed(backend: &MemoryBackend) -> anyhow::Result<()> {
    // Low cost: these are throwaway demo credentials.
    let password = bcrypt::hash("secret", 4).context("failed to hash demo password")?;

    backend
        .seed(
            "categories",
            rows(vec![
                json!({"id": 1, "name": "Coffee", "description": "Beans and ground coffee"}),
                json!({"id": 2, "name": "Tea", "description": "Loose leaf and bags"}),
                json!({"id": 3, "name": "Brewing", "description": "Kettles, grinders and filters"}),
            ]),
        )
        .await;

    backend
        .seed(
            "products",
            rows(vec![
                json!({"id": 1, "name": "House Blend", "code": "COF-001", "price": 12.5, "description": "Medium roast", "active": true, "category_id": 1, "created_at": "2025-01-05T09:00:00+00:00"}),
                json!({"id": 2, "name": "Ethiopia Guji", "code": "COF-002", "price": 16.0, "description": "Light roast, floral", "active": true, "category_id": 1, "created_at": "2025-01-06T09:00:00+00:00"}),
                json!({"id": 3, "name": "Sencha", "code": "TEA-001", "price": 9.75, "description": "Japanese green tea", "active": true, "category_id": 2, "created_at": "2025-01-07T09:00:00+00:00"}),
                json!({"id": 4, "name": "Earl Grey", "code": "TEA-002", "price": 7.5, "description": null, "active": false, "category_id": 2, "created_at": "2025-01-08T09:00:00+00:00"}),
                json!({"id": 5, "name": "Gooseneck Kettle", "code": "BRW-001", "price": 59.0, "description": "Temperature control", "active": true, "category_id": 3, "created_at": "2025-01-09T09:00:00+00:00"}),
            ]),
        )
        .await;

    backend
        .seed(
            "customers",
            rows(vec![
                json!({"id": 1, "name": "Ada Lovelace", "email": "ada@example.com", "password": password, "vip": true, "created_at": "2025-02-01T10:00:00+00:00"}),
                json!({"id": 2, "name": "Grace Hopper", "email": "grace@example.com", "password": password, "vip": false, "created_at": "2025-02-02T10:00:00+00:00"}),
                json!({"id": 3, "name": "Alan Turing", "email": "alan@example.com", "password": password, "vip": false, "created_at": "2025-02-03T10:00:00+00:00"}),
            ]),
        )
        .await;

    backend
        .seed(
            "orders",
            rows(vec![
                json!({"id": 1, "number": "SO-1001", "customer_id": 1, "state": "pending", "total": 25.0, "notes": null, "carrier": null, "shipped_at": null, "created_at": "2025-03-01T12:00:00+00:00"}),
                json!({"id": 2, "number": "SO-1002", "customer_id": 1, "state": "paid", "total": 118.5, "notes": "Gift wrap", "carrier": null, "shipped_at": null, "created_at": "2025-03-02T12:00:00+00:00"}),
                json!({"id": 3, "number": "SO-1003", "customer_id": 2, "state": "shipped", "total": 59.0, "notes": null, "carrier": "dhl", "shipped_at": "2025-03-04T08:00:00+00:00", "created_at": "2025-03-03T12:00:00+00:00"}),
                json!({"id": 4, "number": "SO-1004", "customer_id": 3, "state": "pending", "total": 9.75, "notes": null, "carrier": null, "shipped_at": null, "created_at": "2025-03-04T12:00:00+00:00"}),
                json!({"id": 5, "number": "SO-1005", "customer_id": 2, "state": "paid", "total": 32.0, "notes": null, "carrier": null, "shipped_at": null, "created_at": "2025-03-05T12:00:00+00:00"}),
            ]),
        )
        .await;

    info!("🌱 Seeded demo storefront");
    Ok(())
}
