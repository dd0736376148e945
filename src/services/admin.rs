use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{allowed, AdminContext, Roles, Subject, Target, Verb};
use crate::backend::{Backend, Direction, Predicate, Query, Record, Table};
use crate::error::{AdminError, AdminResult, FieldError};
use crate::registry::Registry;
use crate::resource::{
    flatten, project, project_allowed, Action, ActionMode, Cardinality, FieldKind, OptionSource,
    Projected, ProjectedField, Resource, SelectOption, View,
};
use crate::services::decode::decode;
use crate::services::search::{build_query, resolve_scopes};
use crate::services::view::{
    ActionView, Capabilities, FieldEntry, MenuItem, Pagination, RecordView, ScopeView,
    SearchGroup, SearchState, ViewModel,
};

/// Cap on choices loaded for an association select.
const OPTION_LIMIT: u64 = 500;
const SEARCH_CENTER_LIMIT: u64 = 10;

#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub per_page: u64,
    pub max_per_page: u64,
    pub require_auth: bool,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            per_page: 20,
            max_per_page: 100,
            require_auth: false,
        }
    }
}

/// List request parameters, read from raw query pairs so repeated keys
/// keep their order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub keyword: Option<String>,
    pub scopes: Vec<String>,
    pub page: u64,
    pub per_page: Option<u64>,
    pub sort: Option<String>,
}

impl ListParams {
    /// Accepts `scope=..`, `scopes=..`, `scopes[]=..` and `scope[Group]=..`.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut params = ListParams {
            page: 1,
            ..Default::default()
        };
        for (key, value) in pairs {
            match key.as_str() {
                "keyword" | "q" => params.keyword = Some(value.clone()).filter(|k| !k.trim().is_empty()),
                "page" => params.page = value.parse::<u64>().unwrap_or(1).max(1),
                "per_page" => params.per_page = value.parse().ok(),
                "sort" => params.sort = Some(value.clone()).filter(|s| !s.is_empty()),
                "scope" | "scopes" | "scopes[]" => params.scopes.push(value.clone()),
                other if other.starts_with("scope[") && other.ends_with(']') => {
                    params.scopes.push(value.clone())
                }
                _ => {}
            }
        }
        params
    }
}

/// Outcome of a create or update: either stored, or sent back with errors.
#[derive(Debug, Clone)]
pub enum Submission {
    Saved(ViewModel),
    Invalid(ViewModel),
}

/// A request to run an action.
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub mode: Option<ActionMode>,
    /// Path record for record routes.
    pub id: Option<String>,
    /// Selected records for bulk routes.
    pub ids: Vec<Value>,
    pub argument: Option<Record>,
}

/// Request-level entry point of the admin: resolves resources, checks
/// permissions, projects attributes and talks to the backend.
#[derive(Clone)]
pub struct AdminService {
    registry: Arc<Registry>,
    backend: Arc<dyn Backend>,
    roles: Roles,
    settings: AdminSettings,
}

impl AdminService {
    pub fn new(registry: Arc<Registry>, backend: Arc<dyn Backend>) -> Self {
        Self {
            registry,
            backend,
            roles: Roles::new(),
            settings: AdminSettings::default(),
        }
    }

    pub fn with_roles(mut self, roles: Roles) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_settings(mut self, settings: AdminSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    pub fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    /// Request context for `subject`, with its roles resolved freshly.
    pub fn context(&self, subject: Option<Subject>) -> AdminResult<AdminContext> {
        if subject.is_none() && self.settings.require_auth {
            return Err(AdminError::Unauthenticated);
        }
        Ok(self.roles.context(subject))
    }

    pub(crate) fn authorize(&self, ctx: &AdminContext, verb: Verb, resource: &Resource) -> AdminResult<()> {
        let target = Target::Resource(resource);
        if allowed(&ctx.roles, verb, target) {
            Ok(())
        } else {
            warn!("🚫 {} denied on {} for roles {:?}", verb, resource.name(), ctx.roles);
            Err(AdminError::forbidden(verb, target.describe()))
        }
    }

    fn capabilities(&self, ctx: &AdminContext, resource: &Resource) -> Capabilities {
        let can = |verb| allowed(&ctx.roles, verb, Target::Resource(resource));
        Capabilities {
            create: can(Verb::Create),
            update: can(Verb::Update),
            delete: can(Verb::Delete),
        }
    }

    /// Typed id from a URL segment: integer keys are parsed, anything else
    /// stays a string.
    pub(crate) fn parse_id(resource: &Resource, id: &str) -> Value {
        let integer_key = resource
            .fields()
            .iter()
            .any(|f| f.name == resource.primary_key() && f.kind == FieldKind::Integer);
        match id.parse::<i64>() {
            Ok(n) if integer_key => Value::from(n),
            _ => Value::String(id.to_string()),
        }
    }

    pub(crate) async fn find_record(&self, resource: &Resource, id: &str) -> AdminResult<Record> {
        let query = self.backend.query(resource).by_id(&Self::parse_id(resource, id));
        self.backend
            .fetch_one(&query)
            .await?
            .ok_or_else(|| AdminError::RecordNotFound {
                resource: resource.name().to_string(),
                id: id.to_string(),
            })
    }

    /// Value of a projected field on `record`, following association hops
    /// for dotted paths. Has-many hops yield arrays.
    async fn field_value(&self, field: &ProjectedField<'_>, record: &Record, ctx: &AdminContext) -> AdminResult<Value> {
        if let Some(association) = field.meta.association().filter(|_| !field.is_nested()) {
            if association.cardinality == Cardinality::Many {
                let target = self.registry.target(&association.target)?;
                let children = self.children(field.owner, target, &association.foreign_key, record).await?;
                return Ok(Value::Array(children.iter().map(|c| target.id_of(c).clone()).collect()));
            }
        }
        if !field.is_nested() {
            return Ok(field.meta.value(record, ctx));
        }

        let mut current = vec![record.clone()];
        let mut many = false;
        for hop in &field.via {
            let Some(association) = hop.meta.association() else {
                return Ok(Value::Null);
            };
            let mut next = Vec::new();
            for parent in &current {
                match association.cardinality {
                    Cardinality::One => {
                        let key = hop.meta.column().and_then(|c| parent.get(c)).cloned().unwrap_or(Value::Null);
                        if key.is_null() {
                            continue;
                        }
                        let query = self.backend.query(hop.to).by_id(&key);
                        next.extend(self.backend.fetch_one(&query).await?);
                    }
                    Cardinality::Many => {
                        many = true;
                        next.extend(self.children(hop.from, hop.to, &association.foreign_key, parent).await?);
                    }
                }
            }
            current = next;
        }

        let values: Vec<Value> = current.iter().map(|r| field.meta.value(r, ctx)).collect();
        Ok(if many {
            Value::Array(values)
        } else {
            values.into_iter().next().unwrap_or(Value::Null)
        })
    }

    async fn children(&self, parent: &Resource, child: &Resource, foreign_key: &str, record: &Record) -> AdminResult<Vec<Record>> {
        let key = parent.id_of(record);
        if key.is_null() {
            return Ok(Vec::new());
        }
        let query = self
            .backend
            .query(child)
            .filter(Predicate::eq(foreign_key, key.clone()));
        Ok(self.backend.fetch_many(&query).await?)
    }

    async fn record_view(
        &self,
        resource: &Resource,
        fields: &[&ProjectedField<'_>],
        record: &Record,
        ctx: &AdminContext,
    ) -> AdminResult<RecordView> {
        let mut values = serde_json::Map::new();
        for field in fields {
            values.insert(field.path.clone(), self.field_value(field, record, ctx).await?);
        }
        Ok(RecordView {
            id: resource.id_of(record).clone(),
            title: resource.title_of(record, ctx),
            values,
            actions: Vec::new(),
        })
    }

    /// Choices for association selects.
    async fn load_options(&self, entries: &mut [FieldEntry], projected: &[Projected<'_>], ctx: &AdminContext) -> AdminResult<()> {
        let fields = flatten(projected);
        for entry in entries.iter_mut() {
            for view in entry.views_mut() {
                let Some(field) = fields.iter().find(|f| f.path == view.name) else {
                    continue;
                };
                view.options = match field.meta.options() {
                    Some(OptionSource::Static(options)) => Some(options.clone()),
                    Some(OptionSource::Resource(target)) if !field.is_nested() => {
                        let target = self.registry.target(target)?;
                        let query = self.backend.query(target).limit(OPTION_LIMIT);
                        let records = self.backend.fetch_many(&query).await?;
                        Some(
                            records
                                .iter()
                                .map(|r| SelectOption::new(target.id_of(r).clone(), target.title_of(r, ctx)))
                                .collect(),
                        )
                    }
                    _ => None,
                };
            }
        }
        Ok(())
    }

    fn argument_layout(&self, action: &Action) -> AdminResult<Vec<FieldEntry>> {
        match action.argument_target() {
            Some(target) => {
                let argument = self.registry.target(target)?;
                Ok(FieldEntry::layout(&project(&self.registry, argument, View::New)?))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Actions of `resource` usable in `mode` by the request's roles.
    fn action_views(&self, resource: &Resource, mode: ActionMode, ctx: &AdminContext) -> AdminResult<Vec<ActionView>> {
        resource
            .actions()
            .iter()
            .filter(|a| a.supports(mode))
            .filter(|a| allowed(&ctx.roles, Verb::Update, Target::Action(resource, a)))
            .map(|a| -> AdminResult<ActionView> { Ok(ActionView::new(a, self.argument_layout(a)?)) })
            .collect()
    }

    fn record_actions(&self, resource: &Resource, mode: ActionMode, record: &Record, ctx: &AdminContext) -> Vec<String> {
        resource
            .actions()
            .iter()
            .filter(|a| a.supports(mode))
            .filter(|a| allowed(&ctx.roles, Verb::Update, Target::Action(resource, a)))
            .filter(|a| a.is_visible(record, ctx))
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Ordering from `sort` (`name` or `-name`), else the resource default,
    /// else the primary key.
    fn apply_order(&self, resource: &Resource, mut query: Query, sort: Option<&str>, ctx: &AdminContext) -> Query {
        if let Some(sort) = sort {
            let (name, direction) = match sort.strip_prefix('-') {
                Some(name) => (name, Direction::Desc),
                None => (sort, Direction::Asc),
            };
            let column = resource
                .meta_named(name)
                .filter(|m| allowed(&ctx.roles, Verb::Read, Target::Meta(resource, m)))
                .and_then(|m| m.column());
            match column {
                Some(column) => return query.order_by(column, direction),
                None => warn!("Ignoring sort by {} on {}", sort, resource.name()),
            }
        }

        for (name, direction) in resource.ordering() {
            if let Some(column) = resource.meta_named(name).and_then(|m| m.column()) {
                query = query.order_by(column, *direction);
            }
        }
        if query.order.is_empty() {
            query = query.order_by(resource.primary_key(), Direction::Asc);
        }
        query
    }

    /// Index page: keyword, scopes, sorting and pagination applied.
    pub async fn list(&self, param: &str, params: &ListParams, ctx: &AdminContext) -> AdminResult<ViewModel> {
        let resource = self.registry.by_param(param)?;
        self.authorize(ctx, Verb::Read, resource)?;

        let projected = project_allowed(&self.registry, resource, View::Index, ctx)?;
        let fields = flatten(&projected);

        let base = self.backend.query(resource);
        let filtered = build_query(
            &self.registry,
            resource,
            params.keyword.as_deref(),
            &params.scopes,
            base,
            ctx,
        );
        let total = self.backend.count(&filtered.unpaged()).await?;

        let per_page = params
            .per_page
            .unwrap_or(self.settings.per_page)
            .clamp(1, self.settings.max_per_page);
        let page = params.page.max(1);
        let query = self
            .apply_order(resource, filtered, params.sort.as_deref(), ctx)
            .paginate(page, per_page);
        debug!("📄 Listing {} page {} ({} per page)", resource.name(), page, per_page);

        let mut records = Vec::new();
        for record in self.backend.fetch_many(&query).await? {
            let mut view = self.record_view(resource, &fields, &record, ctx).await?;
            view.actions = self.record_actions(resource, ActionMode::MenuItem, &record, ctx);
            records.push(view);
        }

        let active: Vec<&str> = resolve_scopes(resource, &params.scopes)
            .into_iter()
            .map(|s| s.name())
            .collect();

        let mut model = ViewModel::new(resource, View::Index, FieldEntry::layout(&projected));
        model.records = records;
        model.scopes = resource
            .scopes()
            .iter()
            .map(|s| ScopeView::new(s, active.contains(&s.name())))
            .collect();
        model.actions = self.action_views(resource, ActionMode::BulkIndex, ctx)?;
        model.search = SearchState {
            keyword: params.keyword.clone(),
            scopes: active.iter().map(|s| s.to_string()).collect(),
            sort: params.sort.clone(),
        };
        model.pagination = Some(Pagination::new(page, per_page, total));
        model.capabilities = self.capabilities(ctx, resource);
        Ok(model)
    }

    /// Empty form for a new record.
    pub async fn new_form(&self, param: &str, ctx: &AdminContext) -> AdminResult<ViewModel> {
        let resource = self.registry.by_param(param)?;
        self.authorize(ctx, Verb::Create, resource)?;
        self.form(resource, View::New, None, Vec::new(), ctx).await
    }

    /// Show page, or the edit form when `view` is [`View::Edit`].
    pub async fn show(&self, param: &str, id: &str, view: View, ctx: &AdminContext) -> AdminResult<ViewModel> {
        let resource = self.registry.by_param(param)?;
        let verb = if view == View::Edit { Verb::Update } else { Verb::Read };
        self.authorize(ctx, verb, resource)?;

        let record = self.find_record(resource, id).await?;
        match view {
            View::Edit => self.form(resource, View::Edit, Some(&record), Vec::new(), ctx).await,
            _ => self.show_page(resource, &record, ctx).await,
        }
    }

    async fn show_page(&self, resource: &Resource, record: &Record, ctx: &AdminContext) -> AdminResult<ViewModel> {
        let projected = project_allowed(&self.registry, resource, View::Show, ctx)?;
        let fields = flatten(&projected);

        let mut view = self.record_view(resource, &fields, record, ctx).await?;
        view.actions = self.record_actions(resource, ActionMode::ShowPage, record, ctx);

        let mut model = ViewModel::new(resource, View::Show, FieldEntry::layout(&projected));
        model.actions = self
            .action_views(resource, ActionMode::ShowPage, ctx)?
            .into_iter()
            .filter(|a| view.actions.contains(&a.name))
            .collect();
        model.record = Some(view);
        model.capabilities = self.capabilities(ctx, resource);
        Ok(model)
    }

    /// New or edit form, holding `record` (stored or as submitted) and any
    /// field errors.
    async fn form(
        &self,
        resource: &Resource,
        view: View,
        record: Option<&Record>,
        errors: Vec<FieldError>,
        ctx: &AdminContext,
    ) -> AdminResult<ViewModel> {
        let projected = project_allowed(&self.registry, resource, view, ctx)?;
        let fields = flatten(&projected);

        let mut layout = FieldEntry::layout(&projected);
        self.load_options(&mut layout, &projected, ctx).await?;

        let mut model = ViewModel::new(resource, view, layout);
        if let Some(record) = record {
            let mut record_view = self.record_view(resource, &fields, record, ctx).await?;
            if view == View::Edit {
                record_view.actions = self.record_actions(resource, ActionMode::EditForm, record, ctx);
                model.actions = self
                    .action_views(resource, ActionMode::EditForm, ctx)?
                    .into_iter()
                    .filter(|a| record_view.actions.contains(&a.name))
                    .collect();
            }
            model.record = Some(record_view);
        }
        model.errors = errors;
        model.capabilities = self.capabilities(ctx, resource);
        Ok(model)
    }

    /// Payload keys naming fields the roles may not write are rejected
    /// outright; keys outside the projection are ignored.
    fn check_writable(&self, resource: &Resource, view: View, payload: &Record, ctx: &AdminContext) -> AdminResult<()> {
        let projected = project(&self.registry, resource, view)?;
        for field in flatten(&projected).into_iter().filter(|f| !f.is_nested()) {
            if payload.contains_key(field.meta.name())
                && !allowed(&ctx.roles, view.verb(), Target::Meta(resource, field.meta))
            {
                let target = Target::Meta(resource, field.meta);
                warn!("🚫 {} denied on {}", view.verb(), target.describe());
                return Err(AdminError::forbidden(view.verb(), target.describe()));
            }
        }
        Ok(())
    }

    pub async fn create(&self, param: &str, payload: Record, ctx: &AdminContext) -> AdminResult<Submission> {
        let resource = self.registry.by_param(param)?;
        self.authorize(ctx, Verb::Create, resource)?;
        self.check_writable(resource, View::New, &payload, ctx)?;

        let projected = project_allowed(&self.registry, resource, View::New, ctx)?;
        let decoded = decode(&self.registry, resource, &flatten(&projected), &payload, None, ctx);

        match decoded {
            Ok(record) => {
                let created = self.backend.create(&Table::from(resource), record).await?;
                info!("✅ Created {} {}", resource.name(), crate::backend::id_string(resource.id_of(&created)));
                Ok(Submission::Saved(self.show_page(resource, &created, ctx).await?))
            }
            Err(errors) => {
                debug!("Create {} rejected: {:?}", resource.name(), errors);
                let model = self.form(resource, View::New, Some(&payload), errors, ctx).await?;
                Ok(Submission::Invalid(model))
            }
        }
    }

    pub async fn update(&self, param: &str, id: &str, payload: Record, ctx: &AdminContext) -> AdminResult<Submission> {
        let resource = self.registry.by_param(param)?;
        self.authorize(ctx, Verb::Update, resource)?;
        self.check_writable(resource, View::Edit, &payload, ctx)?;

        let existing = self.find_record(resource, id).await?;
        let projected = project_allowed(&self.registry, resource, View::Edit, ctx)?;
        let decoded = decode(&self.registry, resource, &flatten(&projected), &payload, Some(&existing), ctx);

        match decoded {
            Ok(fields) => {
                let key = resource.id_of(&existing).clone();
                let updated = self.backend.update(&Table::from(resource), &key, fields).await?;
                info!("✅ Updated {} {}", resource.name(), id);
                Ok(Submission::Saved(self.show_page(resource, &updated, ctx).await?))
            }
            Err(errors) => {
                debug!("Update {} {} rejected: {:?}", resource.name(), id, errors);
                let mut shown = existing;
                shown.extend(payload);
                let model = self.form(resource, View::Edit, Some(&shown), errors, ctx).await?;
                Ok(Submission::Invalid(model))
            }
        }
    }

    pub async fn delete(&self, param: &str, id: &str, ctx: &AdminContext) -> AdminResult<()> {
        let resource = self.registry.by_param(param)?;
        self.authorize(ctx, Verb::Delete, resource)?;

        let existing = self.find_record(resource, id).await?;
        let removed = self
            .backend
            .delete(&Table::from(resource), resource.id_of(&existing))
            .await?;
        if !removed {
            return Err(AdminError::RecordNotFound {
                resource: resource.name().to_string(),
                id: id.to_string(),
            });
        }
        info!("🗑️ Deleted {} {}", resource.name(), id);
        Ok(())
    }

    /// Menu tree of the resources the roles may read.
    pub fn menus(&self, ctx: &AdminContext) -> Vec<MenuItem> {
        let mut items = Vec::new();
        for resource in self.registry.all_resources() {
            if resource.is_invisible() || !allowed(&ctx.roles, Verb::Read, Target::Resource(resource)) {
                continue;
            }
            MenuItem::insert(&mut items, resource.menu_path(), resource);
        }
        items
    }

    /// Runs `keyword` against every visible, readable resource.
    pub async fn search_all(&self, keyword: &str, ctx: &AdminContext) -> AdminResult<Vec<SearchGroup>> {
        let mut groups = Vec::new();
        if keyword.trim().is_empty() {
            return Ok(groups);
        }

        for resource in self.registry.all_resources() {
            if resource.is_invisible() || !allowed(&ctx.roles, Verb::Read, Target::Resource(resource)) {
                continue;
            }
            let query = build_query(&self.registry, resource, Some(keyword), &[], self.backend.query(resource), ctx);
            let total = self.backend.count(&query.unpaged()).await?;
            if total == 0 {
                continue;
            }

            let projected = project_allowed(&self.registry, resource, View::Index, ctx)?;
            let fields = flatten(&projected);
            let query = self.apply_order(resource, query, None, ctx).limit(SEARCH_CENTER_LIMIT);

            let mut records = Vec::new();
            for record in self.backend.fetch_many(&query).await? {
                records.push(self.record_view(resource, &fields, &record, ctx).await?);
            }
            groups.push(SearchGroup {
                resource: resource.into(),
                total,
                records,
            });
        }
        Ok(groups)
    }
}
