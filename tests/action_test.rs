mod common;

use freshadmin::resource::{ActionMode, View};
use freshadmin::services::ActionRequest;
use freshadmin::AdminError;
use serde_json::{json, Value};

use common::{admin_ctx, anonymous, record, row, staff_ctx, storefront};

fn on_record(id: &str) -> ActionRequest {
    ActionRequest {
        id: Some(id.to_string()),
        ..Default::default()
    }
}

fn on_records(ids: Vec<Value>) -> ActionRequest {
    ActionRequest {
        ids,
        ..Default::default()
    }
}

#[tokio::test]
async fn ship_decodes_its_argument_and_updates_the_order() {
    let (admin, backend) = storefront().await;

    let mut request = on_record("2");
    request.argument = Some(record(json!({"carrier": "ups", "tracking_number": "1Z999"})));
    let outcome = admin
        .dispatch("orders", "ship", request, &staff_ctx(&admin))
        .await
        .unwrap();

    assert_eq!(outcome.affected, 1);
    assert_eq!(outcome.data, Some(json!({"tracking_number": "1Z999"})));

    let order = row(&backend, "orders", 2).await;
    assert_eq!(order["state"], "shipped");
    assert_eq!(order["carrier"], "ups");
    assert!(order["shipped_at"].is_string());
}

#[tokio::test]
async fn invalid_argument_is_rejected_before_the_handler_runs() {
    let (admin, backend) = storefront().await;

    let mut request = on_record("2");
    request.argument = Some(record(json!({"carrier": "pigeon"})));
    let err = admin
        .dispatch("orders", "ship", request, &staff_ctx(&admin))
        .await
        .unwrap_err();
    match err {
        AdminError::InvalidArgument { action, errors } => {
            assert_eq!(action, "ship");
            assert!(errors.iter().any(|e| e.field == "carrier"));
        }
        other => panic!("expected an invalid argument, got {:?}", other),
    }

    // A missing argument fails the required carrier too.
    let err = admin
        .dispatch("orders", "ship", on_record("2"), &staff_ctx(&admin))
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::InvalidArgument { .. }));

    assert_eq!(row(&backend, "orders", 2).await["state"], "paid");
}

#[tokio::test]
async fn hidden_records_are_skipped() {
    let (admin, backend) = storefront().await;

    // Order 1 is still pending, so ship does not apply to it.
    let mut request = on_record("1");
    request.argument = Some(record(json!({"carrier": "dhl"})));
    let outcome = admin
        .dispatch("orders", "ship", request, &admin_ctx(&admin))
        .await
        .unwrap();
    assert_eq!(outcome.affected, 0);
    assert_eq!(row(&backend, "orders", 1).await["state"], "pending");

    let outcome = admin
        .dispatch("orders", "mark_paid", on_records(vec![json!(1), json!(2), json!(4)]), &staff_ctx(&admin))
        .await
        .unwrap();
    assert_eq!(outcome.affected, 2);
    assert_eq!(row(&backend, "orders", 1).await["state"], "paid");
    assert_eq!(row(&backend, "orders", 4).await["state"], "paid");
    assert_eq!(row(&backend, "orders", 2).await["state"], "paid");
}

#[tokio::test]
async fn form_ids_arrive_as_strings() {
    let (admin, backend) = storefront().await;

    let outcome = admin
        .dispatch("orders", "cancel", on_records(vec![json!("4"), json!("3")]), &admin_ctx(&admin))
        .await
        .unwrap();
    assert_eq!(outcome.affected, 1);
    assert_eq!(row(&backend, "orders", 4).await["state"], "cancelled");
    assert_eq!(row(&backend, "orders", 3).await["state"], "shipped");
}

#[tokio::test]
async fn action_permission_overrides_the_resource() {
    let (admin, backend) = storefront().await;

    for ctx in [staff_ctx(&admin), anonymous(&admin)] {
        let err = admin
            .dispatch("orders", "cancel", on_record("1"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Forbidden { .. }), "got {:?}", err);
    }
    assert_eq!(row(&backend, "orders", 1).await["state"], "pending");

    let outcome = admin
        .dispatch("orders", "cancel", on_record("1"), &admin_ctx(&admin))
        .await
        .unwrap();
    assert_eq!(outcome.affected, 1);
}

#[tokio::test]
async fn unknown_actions_and_unsupported_modes() {
    let (admin, _) = storefront().await;
    let ctx = admin_ctx(&admin);

    let err = admin.dispatch("orders", "refund", on_record("1"), &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::ActionNotFound { .. }));

    // Bulk only.
    let err = admin.dispatch("orders", "mark_paid", on_record("1"), &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::ActionNotFound { .. }));

    // Record modes only.
    let err = admin
        .dispatch("orders", "ship", on_records(vec![json!(2)]), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::ActionNotFound { .. }));

    let mut request = on_record("1");
    request.mode = Some(ActionMode::EditForm);
    let err = admin.dispatch("orders", "cancel", request, &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::ActionNotFound { .. }));

    let err = admin.dispatch("invoices", "ship", on_record("1"), &ctx).await.unwrap_err();
    assert!(matches!(err, AdminError::UnknownResource(_)));
}

#[tokio::test]
async fn pages_offer_only_applicable_actions() {
    let (admin, _) = storefront().await;

    let paid = admin.show("orders", "2", View::Show, &admin_ctx(&admin)).await.unwrap();
    assert_eq!(paid.record.unwrap().actions, vec!["ship", "cancel"]);
    let names: Vec<&str> = paid.actions.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["ship", "cancel"]);
    assert!(!paid.actions[0].argument.is_empty());

    let paid = admin.show("orders", "2", View::Show, &staff_ctx(&admin)).await.unwrap();
    assert_eq!(paid.record.unwrap().actions, vec!["ship"]);

    let shipped = admin.show("orders", "3", View::Show, &admin_ctx(&admin)).await.unwrap();
    assert!(shipped.record.unwrap().actions.is_empty());
    assert!(shipped.actions.is_empty());

    let index = admin
        .list("orders", &Default::default(), &staff_ctx(&admin))
        .await
        .unwrap();
    let bulk: Vec<&str> = index.actions.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(bulk, vec!["mark_paid"]);
    assert_eq!(index.actions[0].label, "Mark as paid");
}
