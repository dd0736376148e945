mod common;

use freshadmin::resource::View;
use freshadmin::AdminError;
use serde_json::{json, Value};

use common::{admin_ctx, anonymous, record, rejected, row, saved, staff_ctx, storefront};

fn error_fields(model: &freshadmin::services::ViewModel) -> Vec<&str> {
    model.errors.iter().map(|e| e.field.as_str()).collect()
}

#[tokio::test]
async fn new_form_then_create_then_show() {
    let (admin, backend) = storefront().await;
    let ctx = anonymous(&admin);

    let form = admin.new_form("products", &ctx).await.unwrap();
    assert_eq!(form.view, View::New);
    assert!(form.record.is_none());
    assert!(form.capabilities.create);

    let payload = record(json!({
        "name": "Matcha",
        "code": "TEA-003",
        "category": "2",
        "price": "18.50",
        "active": "true",
        "description": "Stone ground",
    }));
    let model = saved(admin.create("products", payload, &ctx).await.unwrap());
    assert_eq!(model.view, View::Show);

    let shown = model.record.unwrap();
    assert_eq!(shown.id, json!(6));
    assert_eq!(shown.title, "Matcha");
    assert_eq!(shown.values["category"], json!(2));
    assert_eq!(shown.values["category.description"], "Loose leaf and bags");
    assert_eq!(shown.values["price"], json!(18.5));

    let stored = row(&backend, "products", 6).await;
    assert_eq!(stored["active"], json!(true));
    assert_eq!(stored["code"], "TEA-003");

    let again = admin.show("products", "6", View::Show, &ctx).await.unwrap();
    assert_eq!(again.record.unwrap().values["name"], "Matcha");
}

#[tokio::test]
async fn unchecked_box_is_stored_as_false() {
    let (admin, backend) = storefront().await;
    let payload = record(json!({"name": "Filter Papers", "code": "BRW-002", "category": "3", "price": "4"}));
    saved(admin.create("products", payload, &anonymous(&admin)).await.unwrap());
    assert_eq!(row(&backend, "products", 6).await["active"], json!(false));
}

#[tokio::test]
async fn invalid_submissions_come_back_with_errors() {
    let (admin, backend) = storefront().await;
    let ctx = anonymous(&admin);

    let payload = record(json!({"name": "Refund", "code": "X-1", "category": "1", "price": "-3"}));
    let model = rejected(admin.create("products", payload, &ctx).await.unwrap());
    assert_eq!(model.view, View::New);
    assert_eq!(error_fields(&model), vec!["price"]);
    assert_eq!(model.errors[0].message, "must not be negative");
    assert_eq!(model.record.unwrap().values["name"], "Refund");

    let payload = record(json!({"name": "Odd", "price": "cheap", "category": "one"}));
    let model = rejected(admin.create("products", payload, &ctx).await.unwrap());
    let mut fields = error_fields(&model);
    fields.sort();
    assert_eq!(fields, vec!["category", "price"]);

    // Required fields are checked on create only.
    let model = rejected(
        admin
            .create("orders", record(json!({"customer": "1", "total": "10"})), &ctx)
            .await
            .unwrap(),
    );
    let mut fields = error_fields(&model);
    fields.sort();
    assert_eq!(fields, vec!["number", "state"]);

    let model = rejected(
        admin
            .create("orders", record(json!({"number": "SO-2000", "state": "lost", "customer": "1", "total": "10"})), &ctx)
            .await
            .unwrap(),
    );
    assert_eq!(error_fields(&model), vec!["state"]);

    assert_eq!(backend.rows("products").await.len(), 5);
    assert_eq!(backend.rows("orders").await.len(), 5);
}

#[tokio::test]
async fn update_merges_and_validates_against_the_stored_record() {
    let (admin, backend) = storefront().await;
    let ctx = anonymous(&admin);

    let model = saved(
        admin
            .update("orders", "1", record(json!({"total": "30.25", "notes": "<p>Call first</p>"})), &ctx)
            .await
            .unwrap(),
    );
    assert_eq!(model.record.unwrap().title, "SO-1001");

    let order = row(&backend, "orders", 1).await;
    assert_eq!(order["total"], json!(30.25));
    assert_eq!(order["notes"], "<p>Call first</p>");
    assert_eq!(order["number"], "SO-1001");

    // Readonly fields are not written.
    saved(admin.update("orders", "1", record(json!({"carrier": "ups"})), &ctx).await.unwrap());
    assert_eq!(row(&backend, "orders", 1).await["carrier"], Value::Null);

    let model = rejected(admin.update("orders", "1", record(json!({"number": ""})), &ctx).await.unwrap());
    assert_eq!(model.view, View::Edit);
    assert_eq!(error_fields(&model), vec!["number"]);
    assert_eq!(row(&backend, "orders", 1).await["number"], "SO-1001");
}

#[tokio::test]
async fn passwords_are_hashed_and_kept_when_blank() {
    let (admin, backend) = storefront().await;
    let ctx = admin_ctx(&admin);

    let payload = record(json!({
        "name": "Edsger Dijkstra",
        "email": "  EDSGER@Example.com ",
        "password": "hunter2",
        "vip": "on",
    }));
    let model = saved(admin.create("customers", payload, &ctx).await.unwrap());
    let shown = model.record.unwrap();
    assert_eq!(shown.values["contact"], "Edsger Dijkstra <edsger@example.com>");
    assert!(!shown.values.contains_key("password"));

    let stored = row(&backend, "customers", 4).await;
    assert_eq!(stored["email"], "edsger@example.com");
    assert_eq!(stored["vip"], json!(true));
    let hash = stored["password"].as_str().unwrap().to_string();
    assert!(bcrypt::verify("hunter2", &hash).unwrap());

    saved(
        admin
            .update("customers", "4", record(json!({"name": "E. W. Dijkstra", "password": ""})), &ctx)
            .await
            .unwrap(),
    );
    let stored = row(&backend, "customers", 4).await;
    assert_eq!(stored["name"], "E. W. Dijkstra");
    assert_eq!(stored["password"], json!(hash));

    let model = rejected(
        admin
            .update("customers", "4", record(json!({"email": "nobody"})), &ctx)
            .await
            .unwrap(),
    );
    assert_eq!(model.errors[0].message, "is not an email address");
}

#[tokio::test]
async fn edit_form_never_echoes_passwords() {
    let (admin, _) = storefront().await;
    let model = admin.show("customers", "1", View::Edit, &admin_ctx(&admin)).await.unwrap();
    let values = model.record.unwrap().values;
    assert_eq!(values["password"], Value::Null);
    assert_eq!(values["email"], "ada@example.com");
}

#[tokio::test]
async fn has_many_values_list_child_ids() {
    let (admin, _) = storefront().await;
    let model = admin.show("customers", "2", View::Show, &staff_ctx(&admin)).await.unwrap();

    let mut orders: Vec<i64> = model.record.unwrap().values["orders"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    orders.sort();
    assert_eq!(orders, vec![3, 5]);

    assert!(!model.capabilities.update);
    assert!(!model.capabilities.delete);
}

#[tokio::test]
async fn delete_removes_the_record() {
    let (admin, backend) = storefront().await;
    let ctx = anonymous(&admin);

    admin.delete("products", "5", &ctx).await.unwrap();
    assert_eq!(backend.rows("products").await.len(), 4);

    let err = admin.show("products", "5", View::Show, &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::RecordNotFound { .. }));

    let err = admin.delete("products", "5", &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::RecordNotFound { .. }));
}

#[tokio::test]
async fn permissions_guard_every_operation() {
    let (admin, backend) = storefront().await;

    let err = admin.list("customers", &Default::default(), &anonymous(&admin)).await.unwrap_err();
    assert!(matches!(err, AdminError::Forbidden { .. }));

    let staff = staff_ctx(&admin);
    assert!(admin.list("customers", &Default::default(), &staff).await.is_ok());

    let err = admin
        .create("customers", record(json!({"name": "Eve", "email": "eve@example.com"})), &staff)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Forbidden { .. }));

    let err = admin.delete("customers", "1", &staff).await.unwrap_err();
    assert!(matches!(err, AdminError::Forbidden { .. }));
    assert_eq!(backend.rows("customers").await.len(), 3);

    let err = admin.show("customers", "1", View::Edit, &staff).await.unwrap_err();
    assert!(matches!(err, AdminError::Forbidden { .. }));
}

#[tokio::test]
async fn unknown_resources_and_records() {
    let (admin, _) = storefront().await;
    let ctx = anonymous(&admin);

    let err = admin.list("invoices", &Default::default(), &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::UnknownResource(_)));
    assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);

    let err = admin.show("orders", "999", View::Show, &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::RecordNotFound { .. }));
}
