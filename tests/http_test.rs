mod common;

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use freshadmin::auth::{JwtService, Subject};
use freshadmin::services::AdminSettings;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{row, storefront};

const SECRET: &str = "test-secret";

async fn app() -> (Router, std::sync::Arc<freshadmin::backend::MemoryBackend>) {
    let (admin, backend) = storefront().await;
    let router = freshadmin::http::router(admin, JwtService::new(SECRET, 1), "/admin");
    (router, backend)
}

fn bearer(email: &str) -> String {
    let mut subject = Subject::new("7");
    subject.email = Some(email.to_string());
    let token = JwtService::new(SECRET, 1).generate_token(&subject).unwrap();
    format!("Bearer {}", token)
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_sits_outside_the_prefix() {
    let (app, _) = app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn lists_render_as_json_by_suffix_or_accept() {
    let (app, _) = app().await;

    let response = app
        .clone()
        .oneshot(get("/admin/orders.json?scope%5BState%5D=Paid&scope%5BState%5D=Shipped"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["resource"]["param"], "orders");
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["records"][0]["title"], "SO-1003");
    assert_eq!(body["pagination"]["total"], 1);

    let request = Request::builder()
        .uri("/admin/products?keyword=coffee")
        .header(ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let body = body_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn new_form_renders_as_json() {
    let (app, _) = app().await;

    let response = app.clone().oneshot(get("/admin/products/new.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["resource"]["param"], "products");
    assert_eq!(body["view"], "new");
    assert!(body["record"].is_null());
    assert!(!body["fields"].as_array().unwrap().is_empty());

    // Plain `new` is still the HTML form.
    let response = app.oneshot(get("/admin/products/new")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<form method=\"post\""));
}

#[tokio::test]
async fn html_pages_render() {
    let (app, _) = app().await;

    let response = app.clone().oneshot(get("/admin/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("SO-1001"));
    assert!(page.contains("/admin/orders/actions/mark_paid"));

    let page = body_text(app.clone().oneshot(get("/admin/products/new")).await.unwrap()).await;
    assert!(page.contains("Basics"));
    assert!(page.contains("name=\"price\""));

    let page = body_text(app.oneshot(get("/admin")).await.unwrap()).await;
    assert!(page.contains("Catalog"));
    assert!(page.contains("/admin/orders"));
    assert!(!page.contains("/admin/customers"));
}

#[tokio::test]
async fn form_create_redirects_to_the_new_record() {
    let (app, backend) = app().await;

    let response = app
        .clone()
        .oneshot(post_form(
            "/admin/products",
            "name=Matcha&code=TEA-003&category=2&price=18.50&active=false&active=true",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/admin/products/6");
    assert_eq!(row(&backend, "products", 6).await["active"], json!(true));

    let response = app
        .oneshot(post_form("/admin/products", "name=Refund&code=X&category=1&price=-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("must not be negative"));
}

#[tokio::test]
async fn json_create_returns_created() {
    let (app, _) = app().await;
    let response = app
        .oneshot(post_json(
            "/admin/categories",
            json!({"name": "Cocoa", "description": "Drinking chocolate"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["record"]["title"], "Cocoa");
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let (app, _) = app().await;

    let response = app.clone().oneshot(get("/admin/invoices.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);

    let response = app.clone().oneshot(get("/admin/orders/999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/admin/customers.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bearer_tokens_resolve_roles() {
    let (app, _) = app().await;

    let request = Request::builder()
        .uri("/admin/customers.json")
        .header(AUTHORIZATION, bearer("clerk@example.com"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["records"].as_array().unwrap().len(), 3);

    // A bad token is treated as no token.
    let request = Request::builder()
        .uri("/admin/customers.json")
        .header(AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn required_authentication_rejects_anonymous_callers() {
    let (admin, _) = storefront().await;
    let admin = admin.with_settings(AdminSettings {
        require_auth: true,
        ..Default::default()
    });
    let app = freshadmin::http::router(admin, JwtService::new(SECRET, 1), "/admin");

    let response = app.clone().oneshot(get("/admin/products.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/admin/products.json")
        .header(AUTHORIZATION, bearer("clerk@example.com"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(request).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn actions_over_json_and_forms() {
    let (app, backend) = app().await;

    let mut request = post_json("/admin/orders/2/actions/ship", json!({"argument": {"carrier": "fedex"}}));
    request
        .headers_mut()
        .insert(AUTHORIZATION, bearer("clerk@example.com").parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["affected"], 1);
    assert_eq!(row(&backend, "orders", 2).await["carrier"], "fedex");

    let response = app
        .clone()
        .oneshot(post_json("/admin/orders/5/actions/ship", json!({"argument": {"carrier": "pigeon"}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["fields"][0]["field"], "carrier");

    let response = app
        .clone()
        .oneshot(post_form("/admin/orders/actions/mark_paid", "ids%5B%5D=1&ids%5B%5D=4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/admin/orders");
    assert_eq!(row(&backend, "orders", 4).await["state"], "paid");

    let response = app
        .oneshot(post_json("/admin/orders/actions/cancel", json!({"ids": [5]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
