pub mod action;
pub mod attrs;
pub mod field;
pub mod meta;
pub mod scope;

pub use action::*;
pub use attrs::*;
pub use field::{AssocTarget, Describe, FieldDef, FieldKind, ModelInfo};
pub use meta::*;
pub use scope::*;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::auth::{AdminContext, Permission};
use crate::backend::{id_string, Direction, Query, Record};
use crate::error::{AdminError, AdminResult, FieldError};
use field::humanize;

pub type SearchHandler = Arc<dyn Fn(Query, &str, &AdminContext) -> Query + Send + Sync>;
pub type Validator = Arc<dyn Fn(&Record, &AdminContext) -> Vec<FieldError> + Send + Sync>;

const TITLE_CANDIDATES: [&str; 5] = ["name", "title", "email", "code", "number"];

/// A registered model type and everything the admin knows about it.
///
/// Configured through the chainable `&mut self` methods between
/// [`Registry::register`](crate::registry::Registry::register) and
/// [`Registry::finish`](crate::registry::Registry::finish); read-only after.
pub struct Resource {
    type_id: TypeId,
    name: String,
    param: String,
    label: String,
    table: String,
    primary_key: String,
    fields: Vec<FieldDef>,
    declared: Vec<MetaConfig>,
    metas: Vec<Meta>,
    attrs: HashMap<View, Attrs>,
    search_attrs: Vec<String>,
    search_handler: Option<SearchHandler>,
    scopes: Vec<Scope>,
    actions: Vec<Action>,
    permission: Option<Permission>,
    menu: Vec<String>,
    invisible: bool,
    theme: Option<String>,
    default_order: Vec<(String, Direction)>,
    title_field: Option<String>,
    validators: Vec<Validator>,
}

impl Resource {
    pub(crate) fn from_info(type_id: TypeId, info: ModelInfo) -> Self {
        let mut resource = Self {
            type_id,
            label: humanize(&field::snake_case(&info.name)),
            param: info.table.clone(),
            name: info.name,
            table: info.table,
            primary_key: info.primary_key,
            fields: info.fields,
            declared: Vec::new(),
            metas: Vec::new(),
            attrs: HashMap::new(),
            search_attrs: Vec::new(),
            search_handler: None,
            scopes: Vec::new(),
            actions: Vec::new(),
            permission: None,
            menu: Vec::new(),
            invisible: false,
            theme: None,
            default_order: Vec::new(),
            title_field: None,
            validators: Vec::new(),
        };
        resource.rebuild_metas();
        resource
    }

    /// Re-runs inference for every field and overlays the declarations.
    fn rebuild_metas(&mut self) {
        let mut metas: Vec<Meta> = self
            .fields
            .iter()
            .filter_map(|field| {
                let declared = self.declared.iter().find(|d| d.name == field.name);
                Meta::build(Some(field), declared)
            })
            .collect();

        metas.extend(
            self.declared
                .iter()
                .filter(|d| !self.fields.iter().any(|f| f.name == d.name))
                .filter_map(|d| Meta::build(None, Some(d))),
        );
        self.metas = metas;
    }

    /// Fails for reflected fields nothing can render and for declarations
    /// that match no field and carry no UI type.
    pub(crate) fn check_metas(&self) -> AdminResult<()> {
        for field in &self.fields {
            if self.meta_named(&field.name).is_none() {
                let kind = match &field.kind {
                    FieldKind::Opaque(kind) => kind.clone(),
                    other => format!("{:?}", other),
                };
                return Err(AdminError::UnsupportedFieldKind {
                    resource: self.name.clone(),
                    field: field.name.clone(),
                    kind,
                });
            }
        }
        for declared in &self.declared {
            if self.meta_named(&declared.name).is_none() {
                return Err(AdminError::unknown_attribute(&self.name, &declared.name, "meta"));
            }
        }
        Ok(())
    }

    // Configuration

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// URL segment; defaults to the table name.
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn set_param(&mut self, param: impl Into<String>) -> &mut Self {
        self.param = param.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    /// Declares (or re-declares) a meta. Repeated declarations for one name
    /// merge, the later one winning per setting.
    pub fn meta(&mut self, config: MetaConfig) -> &mut Self {
        match self.declared.iter_mut().find(|d| d.name == config.name) {
            Some(existing) => existing.merge(config),
            None => self.declared.push(config),
        }
        self.rebuild_metas();
        self
    }

    pub fn attrs(&mut self, view: View, attrs: impl Into<Attrs>) -> &mut Self {
        self.attrs.insert(view, attrs.into());
        self
    }

    pub fn index_attrs(&mut self, attrs: impl Into<Attrs>) -> &mut Self {
        self.attrs(View::Index, attrs)
    }

    pub fn new_attrs(&mut self, attrs: impl Into<Attrs>) -> &mut Self {
        self.attrs(View::New, attrs)
    }

    pub fn edit_attrs(&mut self, attrs: impl Into<Attrs>) -> &mut Self {
        self.attrs(View::Edit, attrs)
    }

    pub fn show_attrs(&mut self, attrs: impl Into<Attrs>) -> &mut Self {
        self.attrs(View::Show, attrs)
    }

    /// Keyword search targets; dotted paths go through associations.
    pub fn search_attrs<I, S>(&mut self, attrs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_attrs = attrs.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces keyword handling entirely.
    pub fn search_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Query, &str, &AdminContext) -> Query + Send + Sync + 'static,
    {
        self.search_handler = Some(Arc::new(handler));
        self
    }

    pub fn scope(&mut self, scope: Scope) -> &mut Self {
        match self.scopes.iter_mut().find(|s| s.name() == scope.name()) {
            Some(existing) => *existing = scope,
            None => self.scopes.push(scope),
        }
        self
    }

    pub fn action(&mut self, action: Action) -> &mut Self {
        match self.actions.iter_mut().find(|a| a.name() == action.name()) {
            Some(existing) => *existing = action,
            None => self.actions.push(action),
        }
        self
    }

    pub fn permission(&mut self, permission: Permission) -> &mut Self {
        self.permission = Some(permission);
        self
    }

    pub fn menu<I, S>(&mut self, path: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.menu = path.into_iter().map(Into::into).collect();
        self
    }

    /// Hidden from menus and the search center; routes still work.
    pub fn invisible(&mut self) -> &mut Self {
        self.invisible = true;
        self
    }

    pub fn theme(&mut self, theme: impl Into<String>) -> &mut Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn default_order(&mut self, meta: impl Into<String>, direction: Direction) -> &mut Self {
        self.default_order.push((meta.into(), direction));
        self
    }

    pub fn title_field(&mut self, meta: impl Into<String>) -> &mut Self {
        self.title_field = Some(meta.into());
        self
    }

    /// Record-level check run after field decoding on create and update.
    pub fn validate<F>(&mut self, validator: F) -> &mut Self
    where
        F: Fn(&Record, &AdminContext) -> Vec<FieldError> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    // Accessors

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn metas(&self) -> &[Meta] {
        &self.metas
    }

    pub fn meta_named(&self, name: &str) -> Option<&Meta> {
        self.metas.iter().find(|m| m.name() == name)
    }

    pub fn attrs_for(&self, view: View) -> Option<&Attrs> {
        self.attrs.get(&view)
    }

    pub fn search_paths(&self) -> &[String] {
        &self.search_attrs
    }

    pub fn custom_search(&self) -> Option<&SearchHandler> {
        self.search_handler.as_ref()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope_named(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name() == name)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action_named(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn rules(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }

    pub fn menu_path(&self) -> &[String] {
        &self.menu
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn theme_name(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.default_order
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Meta used to name a record in links, options and search results.
    pub fn title_meta(&self) -> Option<&Meta> {
        match &self.title_field {
            Some(name) => self.meta_named(name),
            None => TITLE_CANDIDATES.iter().find_map(|name| self.meta_named(name)),
        }
    }

    pub(crate) fn declared_title(&self) -> Option<&str> {
        self.title_field.as_deref()
    }

    pub fn title_of(&self, record: &Record, ctx: &AdminContext) -> String {
        let title = self
            .title_meta()
            .map(|meta| meta.value(record, ctx))
            .filter(|v| !v.is_null());
        match title {
            Some(value) => id_string(&value),
            None => format!("{} #{}", self.name, id_string(self.id_of(record))),
        }
    }

    pub fn id_of<'r>(&self, record: &'r Record) -> &'r Value {
        record.get(&self.primary_key).unwrap_or(&Value::Null)
    }
}
