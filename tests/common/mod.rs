#![allow(dead_code)]

use std::sync::Arc;

use freshadmin::auth::{AdminContext, Subject};
use freshadmin::backend::{MemoryBackend, Record};
use freshadmin::services::{Submission, ViewModel};
use freshadmin::{demo, AdminService};
use serde_json::Value;

/// Demo storefront on a freshly seeded in-memory backend.
pub async fn storefront() -> (AdminService, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    demo::seed(&backend).await.expect("Failed to seed demo data");

    let registry = demo::registry().expect("Demo registry should be valid");
    let admin = AdminService::new(registry, backend.clone()).with_roles(demo::roles());
    (admin, backend)
}

pub fn subject(id: &str, email: &str) -> Subject {
    let mut subject = Subject::new(id);
    subject.email = Some(email.to_string());
    subject
}

pub fn anonymous(admin: &AdminService) -> AdminContext {
    admin.context(None).expect("Anonymous access is on by default")
}

/// Gets `admin` and `staff` from the demo role checkers.
pub fn admin_ctx(admin: &AdminService) -> AdminContext {
    admin
        .context(Some(subject("1", "root@freshadmin.dev")))
        .expect("Failed to build context")
}

/// Gets only `staff`.
pub fn staff_ctx(admin: &AdminService) -> AdminContext {
    admin
        .context(Some(subject("2", "clerk@example.com")))
        .expect("Failed to build context")
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub async fn row(backend: &MemoryBackend, table: &str, id: i64) -> Record {
    backend
        .rows(table)
        .await
        .into_iter()
        .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
        .unwrap_or_else(|| panic!("no row {} in {}", id, table))
}

pub fn saved(submission: Submission) -> ViewModel {
    match submission {
        Submission::Saved(model) => model,
        Submission::Invalid(model) => panic!("submission rejected: {:?}", model.errors),
    }
}

pub fn rejected(submission: Submission) -> ViewModel {
    match submission {
        Submission::Invalid(model) => model,
        Submission::Saved(model) => panic!("submission unexpectedly saved: {:?}", model.record),
    }
}

pub fn titles(model: &ViewModel) -> Vec<&str> {
    model.records.iter().map(|r| r.title.as_str()).collect()
}
