use freshadmin::demo::{self, Shipment};
use freshadmin::entities::{category, customer, order, product};
use freshadmin::error::AdminError;
use freshadmin::registry::Registry;
use freshadmin::resource::{Describe, FieldKind, MetaConfig, MetaKind, ModelInfo, Resource};

#[test]
fn demo_registry_registers_associations_in_order() {
    let registry = demo::registry().expect("Demo registry should be valid");

    let names: Vec<&str> = registry.all_resources().map(Resource::name).collect();
    assert_eq!(names, vec!["Category", "Product", "Customer", "Order", "Shipment"]);

    let params: Vec<&str> = registry.all_resources().map(Resource::param).collect();
    assert_eq!(params, vec!["categories", "products", "customers", "orders", "shipments"]);

    assert_eq!(registry.by_param("orders").unwrap().name(), "Order");
    assert!(matches!(
        registry.by_param("invoices"),
        Err(AdminError::UnknownResource(_))
    ));
}

#[test]
fn reflected_entities_infer_meta_kinds() {
    let registry = demo::registry().unwrap();

    let product = registry.lookup::<product::Model>().unwrap();
    let kind = |name: &str| product.meta_named(name).map(|m| m.kind());
    assert_eq!(kind("name"), Some(MetaKind::Text));
    assert_eq!(kind("price"), Some(MetaKind::Float));
    assert_eq!(kind("description"), Some(MetaKind::Textarea));
    assert_eq!(kind("active"), Some(MetaKind::Checkbox));
    assert_eq!(kind("created_at"), Some(MetaKind::DateTime));
    assert_eq!(kind("id"), Some(MetaKind::Number));
    assert_eq!(kind("category"), Some(MetaKind::SelectOne));
    // The raw foreign key is replaced by the association.
    assert_eq!(kind("category_id"), None);

    let category = registry.lookup::<category::Model>().unwrap();
    assert_eq!(
        category.meta_named("products").map(|m| m.kind()),
        Some(MetaKind::SelectMany)
    );
}

#[test]
fn explicit_overrides_survive_later_declarations() {
    let mut registry = Registry::new();
    registry
        .register::<customer::Model>()
        .meta(MetaConfig::new("password").kind(MetaKind::Password));
    // Re-registering and re-declaring the same name merges.
    registry
        .register::<customer::Model>()
        .meta(MetaConfig::new("password").label("Secret").required(true));

    let registry = registry.finish().expect("Registry should be valid");
    let customer = registry.lookup::<customer::Model>().unwrap();
    let password = customer.meta_named("password").unwrap();
    assert_eq!(password.kind(), MetaKind::Password);
    assert_eq!(password.label(), "Secret");
    assert!(password.is_required());
    assert!(password.is_explicit());
}

#[test]
fn order_state_is_a_select_with_static_choices() {
    let registry = demo::registry().unwrap();
    let order = registry.lookup::<order::Model>().unwrap();
    let state = order.meta_named("state").unwrap();
    assert_eq!(state.kind(), MetaKind::SelectOne);
    assert!(state.is_required());
}

#[test]
fn argument_resources_are_registered_but_hidden() {
    let registry = demo::registry().unwrap();
    let shipment = registry.lookup::<Shipment>().unwrap();
    assert!(shipment.is_invisible());
    assert_eq!(
        shipment.meta_named("carrier").map(|m| m.kind()),
        Some(MetaKind::SelectOne)
    );
}

struct Document;

impl Describe for Document {
    fn describe() -> ModelInfo {
        ModelInfo::new("Document")
            .field("id", FieldKind::Integer)
            .field("title", FieldKind::String)
            .field("payload", FieldKind::Opaque("Json".to_string()))
    }
}

#[test]
fn opaque_fields_need_a_declared_meta() {
    let mut registry = Registry::new();
    registry.register::<Document>();
    assert!(matches!(
        registry.finish(),
        Err(AdminError::UnsupportedFieldKind { field, .. }) if field == "payload"
    ));

    let mut registry = Registry::new();
    registry
        .register::<Document>()
        .meta(MetaConfig::new("payload").kind(MetaKind::Textarea));
    assert!(registry.finish().is_ok());
}

#[test]
fn unknown_attributes_fail_registration() {
    let mut registry = Registry::new();
    registry
        .register::<Document>()
        .meta(MetaConfig::new("payload").kind(MetaKind::Hidden))
        .index_attrs(["title", "author"]);
    assert!(matches!(
        registry.finish(),
        Err(AdminError::UnknownAttribute { attribute, .. }) if attribute == "author"
    ));

    let mut registry = Registry::new();
    registry.register::<product::Model>().search_attrs(["name", "category.slug"]);
    assert!(matches!(
        registry.finish(),
        Err(AdminError::UnknownAttribute { attribute, .. }) if attribute == "category.slug"
    ));

    let mut registry = Registry::new();
    registry.register::<product::Model>().edit_attrs(["-colour"]);
    assert!(matches!(
        registry.finish(),
        Err(AdminError::UnknownAttribute { attribute, .. }) if attribute == "colour"
    ));
}

#[test]
fn url_parameters_must_be_unique() {
    let mut registry = Registry::new();
    registry.register::<category::Model>();
    registry.register::<customer::Model>().set_param("products");
    assert!(matches!(
        registry.finish(),
        Err(AdminError::DuplicateResource(param)) if param == "products"
    ));
}
