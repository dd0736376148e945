//! Serializable page descriptions handed to renderers and JSON clients.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FieldError;
use crate::resource::{
    Action, ActionMode, MetaKind, Projected, ProjectedField, Resource, Scope, SelectOption, View,
};

#[derive(Debug, Clone, Serialize)]
pub struct ResourceInfo {
    pub name: String,
    pub label: String,
    pub param: String,
    pub primary_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl From<&Resource> for ResourceInfo {
    fn from(resource: &Resource) -> Self {
        Self {
            name: resource.name().to_string(),
            label: resource.label().to_string(),
            param: resource.param().to_string(),
            primary_key: resource.primary_key().to_string(),
            theme: resource.theme_name().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub kind: MetaKind,
    pub required: bool,
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
}

impl FieldView {
    pub fn new(field: &ProjectedField<'_>) -> Self {
        Self {
            name: field.path.clone(),
            label: field.label(),
            kind: field.meta.kind(),
            required: field.meta.is_required(),
            readonly: field.is_nested() || !field.meta.is_writable(),
            options: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldEntry {
    Field(FieldView),
    Section {
        title: String,
        rows: Vec<Vec<FieldView>>,
    },
}

impl FieldEntry {
    pub fn layout(projected: &[Projected<'_>]) -> Vec<FieldEntry> {
        projected
            .iter()
            .map(|entry| match entry {
                Projected::Field(field) => FieldEntry::Field(FieldView::new(field)),
                Projected::Section { title, rows } => FieldEntry::Section {
                    title: title.clone(),
                    rows: rows
                        .iter()
                        .map(|row| row.iter().map(FieldView::new).collect())
                        .collect(),
                },
            })
            .collect()
    }

    pub fn views_mut(&mut self) -> Vec<&mut FieldView> {
        match self {
            FieldEntry::Field(view) => vec![view],
            FieldEntry::Section { rows, .. } => rows.iter_mut().flatten().collect(),
        }
    }

    pub fn views(&self) -> Vec<&FieldView> {
        match self {
            FieldEntry::Field(view) => vec![view],
            FieldEntry::Section { rows, .. } => rows.iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub id: Value,
    pub title: String,
    pub values: Map<String, Value>,
    /// Record-level actions available for this record.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeView {
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub active: bool,
}

impl ScopeView {
    pub fn new(scope: &Scope, active: bool) -> Self {
        Self {
            name: scope.name().to_string(),
            label: scope.label_text().to_string(),
            group: scope.group_name().map(str::to_string),
            active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionView {
    pub name: String,
    pub label: String,
    pub modes: Vec<ActionMode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub argument: Vec<FieldEntry>,
}

impl ActionView {
    pub fn new(action: &Action, argument: Vec<FieldEntry>) -> Self {
        Self {
            name: action.name().to_string(),
            label: action.label_text().to_string(),
            modes: action.mode_list().to_vec(),
            argument,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            pages: total.div_ceil(per_page.max(1)),
        }
    }
}

/// What the caller may do with the resource at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    pub resource: ResourceInfo,
    pub view: View,
    pub fields: Vec<FieldEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    pub scopes: Vec<ScopeView>,
    pub actions: Vec<ActionView>,
    pub search: SearchState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub capabilities: Capabilities,
}

impl ViewModel {
    pub fn new(resource: &Resource, view: View, fields: Vec<FieldEntry>) -> Self {
        Self {
            resource: ResourceInfo::from(resource),
            view,
            fields,
            records: Vec::new(),
            record: None,
            errors: Vec::new(),
            scopes: Vec::new(),
            actions: Vec::new(),
            search: SearchState::default(),
            pagination: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Field names in display order, sections flattened.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .flat_map(FieldEntry::views)
            .map(|f| f.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    fn group(label: &str) -> Self {
        Self {
            label: label.to_string(),
            param: None,
            children: Vec::new(),
        }
    }

    /// Files `resource` under `path`, creating groups as needed.
    pub fn insert(items: &mut Vec<MenuItem>, path: &[String], resource: &Resource) {
        match path.split_first() {
            None => items.push(MenuItem {
                label: resource.label().to_string(),
                param: Some(resource.param().to_string()),
                children: Vec::new(),
            }),
            Some((head, rest)) => {
                let position = match items.iter().position(|i| i.param.is_none() && &i.label == head) {
                    Some(position) => position,
                    None => {
                        items.push(MenuItem::group(head));
                        items.len() - 1
                    }
                };
                MenuItem::insert(&mut items[position].children, rest, resource);
            }
        }
    }
}

/// Search center hits for one resource.
#[derive(Debug, Clone, Serialize)]
pub struct SearchGroup {
    pub resource: ResourceInfo,
    pub total: u64,
    pub records: Vec<RecordView>,
}
