mod common;

use freshadmin::demo;
use freshadmin::entities::{category, customer, order, product};
use freshadmin::resource::{flatten, project, project_allowed, Projected, View};

use common::{admin_ctx, anonymous, staff_ctx, storefront};

fn paths(projected: &[Projected<'_>]) -> Vec<String> {
    flatten(projected).iter().map(|f| f.path.clone()).collect()
}

#[test]
fn show_falls_back_to_edit() {
    let registry = demo::registry().unwrap();
    let category = registry.lookup::<category::Model>().unwrap();

    let edit = paths(&project(&registry, category, View::Edit).unwrap());
    let show = paths(&project(&registry, category, View::Show).unwrap());
    assert_eq!(show, edit);
    assert_eq!(edit, vec!["name", "description"]);
    assert!(edit.iter().all(|name| category.meta_named(name).is_some()));
}

#[test]
fn every_view_projects_a_non_empty_subset_of_metas() {
    let registry = demo::registry().unwrap();
    for resource in registry.all_resources() {
        for view in View::ALL {
            let names = paths(&project(&registry, resource, view).unwrap());
            assert!(!names.is_empty(), "{} {} is empty", resource.name(), view);
            for name in &names {
                assert!(
                    registry.resolve_path(resource, name).is_some(),
                    "{} {} projects unknown {}",
                    resource.name(),
                    view,
                    name
                );
            }
        }
    }
}

#[test]
fn index_defaults_skip_long_text_and_collections() {
    let registry = demo::registry().unwrap();
    let category = registry.lookup::<category::Model>().unwrap();
    // Declared index wins over defaults.
    assert_eq!(
        paths(&project(&registry, category, View::Index).unwrap()),
        vec!["name", "description"]
    );

    let shipment = registry.by_param("shipments").unwrap();
    assert_eq!(
        paths(&project(&registry, shipment, View::Index).unwrap()),
        vec!["carrier", "tracking_number"]
    );
}

#[test]
fn sections_keep_their_rows() {
    let registry = demo::registry().unwrap();
    let product = registry.lookup::<product::Model>().unwrap();

    let projected = project(&registry, product, View::New).unwrap();
    let layout: Vec<(String, Vec<Vec<String>>)> = projected
        .iter()
        .filter_map(|entry| match entry {
            Projected::Section { title, rows } => Some((
                title.clone(),
                rows.iter()
                    .map(|row| row.iter().map(|f| f.path.clone()).collect())
                    .collect(),
            )),
            Projected::Field(_) => None,
        })
        .collect();

    assert_eq!(
        layout,
        vec![
            (
                "Basics".to_string(),
                vec![
                    vec!["name".to_string(), "code".to_string()],
                    vec!["category".to_string(), "price".to_string()],
                ]
            ),
            (
                "Details".to_string(),
                vec![vec!["active".to_string()], vec!["description".to_string()]]
            ),
        ]
    );
}

#[test]
fn exclusions_trim_the_defaults() {
    let registry = demo::registry().unwrap();
    let customer = registry.lookup::<customer::Model>().unwrap();
    assert_eq!(
        paths(&project(&registry, customer, View::Edit).unwrap()),
        vec!["name", "email", "password", "vip"]
    );
}

#[tokio::test]
async fn field_permissions_filter_projections() {
    let (admin, _) = storefront().await;
    let registry = admin.registry();
    let customer = registry.lookup::<customer::Model>().unwrap();

    let for_admin = paths(&project_allowed(registry, customer, View::Edit, &admin_ctx(&admin)).unwrap());
    assert!(for_admin.contains(&"password".to_string()));

    // Staff may read customers but not update them, nor touch passwords.
    let for_staff = paths(&project_allowed(registry, customer, View::Edit, &staff_ctx(&admin)).unwrap());
    assert!(for_staff.is_empty());
    let shown = paths(&project_allowed(registry, customer, View::Show, &staff_ctx(&admin)).unwrap());
    assert_eq!(shown, vec!["name", "contact", "vip", "orders", "created_at"]);
}

#[tokio::test]
async fn nested_fields_follow_the_associated_permissions() {
    let (admin, _) = storefront().await;
    let registry = admin.registry();
    let order = registry.lookup::<order::Model>().unwrap();

    let public = paths(&project_allowed(registry, order, View::Show, &anonymous(&admin)).unwrap());
    assert!(!public.contains(&"customer.email".to_string()));
    assert!(public.contains(&"customer".to_string()));

    let staff = paths(&project_allowed(registry, order, View::Show, &staff_ctx(&admin)).unwrap());
    assert!(staff.contains(&"customer.email".to_string()));
}
