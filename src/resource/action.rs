//! Custom operations attached to a resource.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::auth::{AdminContext, Permission};
use crate::backend::{Backend, Record, Table};
use crate::resource::field::{humanize, AssocTarget, Describe};

/// Where an action can be triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
pub enum ActionMode {
    #[serde(rename = "bulk")]
    #[strum(serialize = "bulk")]
    BulkIndex,
    #[serde(rename = "edit")]
    #[strum(serialize = "edit")]
    EditForm,
    #[serde(rename = "show")]
    #[strum(serialize = "show")]
    ShowPage,
    #[serde(rename = "menu_item")]
    #[strum(serialize = "menu_item")]
    MenuItem,
}

impl ActionMode {
    /// Modes targeting one record, in the order a record route picks them.
    pub const RECORD: [ActionMode; 3] = [ActionMode::ShowPage, ActionMode::EditForm, ActionMode::MenuItem];

    pub fn is_bulk(self) -> bool {
        self == ActionMode::BulkIndex
    }
}

/// What a handler gets to work with. Owned, so handlers may move it into
/// spawned work.
pub struct ActionInvocation {
    pub resource: String,
    pub action: String,
    pub mode: ActionMode,
    pub records: Vec<Record>,
    /// Decoded argument record, when the action declares an argument.
    pub argument: Option<Record>,
    pub context: AdminContext,
    pub backend: Arc<dyn Backend>,
    pub table: Table,
}

impl ActionInvocation {
    /// Deserializes the decoded argument into the caller's own type.
    pub fn argument_as<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let argument = self
            .argument
            .clone()
            .ok_or_else(|| anyhow::anyhow!("action `{}` takes no argument", self.action))?;
        Ok(serde_json::from_value(Value::Object(argument))?)
    }

    /// Primary keys of the target records.
    pub fn ids(&self) -> Vec<Value> {
        self.records
            .iter()
            .filter_map(|r| r.get(&self.table.primary_key).cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub message: String,
    pub affected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn affected(mut self, affected: usize) -> Self {
        self.affected = affected;
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, invocation: ActionInvocation) -> anyhow::Result<ActionOutcome>;
}

#[async_trait]
impl<F, Fut> ActionHandler for F
where
    F: Fn(ActionInvocation) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionOutcome>> + Send + 'static,
{
    async fn call(&self, invocation: ActionInvocation) -> anyhow::Result<ActionOutcome> {
        (self)(invocation).await
    }
}

pub type Visibility = Arc<dyn Fn(&Record, &AdminContext) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Action {
    name: String,
    label: String,
    modes: Vec<ActionMode>,
    argument: Option<AssocTarget>,
    visible: Option<Visibility>,
    permission: Option<Permission>,
    handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("modes", &self.modes)
            .field("argument", &self.argument)
            .finish_non_exhaustive()
    }
}

impl Action {
    /// Defaults to the edit-form, show-page and menu-item modes.
    pub fn new<H>(name: impl Into<String>, handler: H) -> Self
    where
        H: ActionHandler + 'static,
    {
        let name = name.into();
        Self {
            label: humanize(&name),
            name,
            modes: vec![ActionMode::EditForm, ActionMode::ShowPage, ActionMode::MenuItem],
            argument: None,
            visible: None,
            permission: None,
            handler: Arc::new(handler),
        }
    }

    pub fn modes(mut self, modes: impl IntoIterator<Item = ActionMode>) -> Self {
        let modes: Vec<_> = modes.into_iter().collect();
        if !modes.is_empty() {
            self.modes = modes;
        }
        self
    }

    /// The payload is decoded through `T`'s own Metas before dispatch.
    pub fn argument<T: Describe>(mut self) -> Self {
        self.argument = Some(AssocTarget::of::<T>());
        self
    }

    pub fn visible<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record, &AdminContext) -> bool + Send + Sync + 'static,
    {
        self.visible = Some(Arc::new(predicate));
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_text(&self) -> &str {
        &self.label
    }

    pub fn mode_list(&self) -> &[ActionMode] {
        &self.modes
    }

    pub fn supports(&self, mode: ActionMode) -> bool {
        self.modes.contains(&mode)
    }

    pub fn argument_target(&self) -> Option<&AssocTarget> {
        self.argument.as_ref()
    }

    pub fn rules(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }

    pub fn handler(&self) -> Arc<dyn ActionHandler> {
        Arc::clone(&self.handler)
    }

    /// Mode used on a record route: the requested one if supported,
    /// otherwise the first supported record mode.
    pub fn record_mode(&self, requested: Option<ActionMode>) -> Option<ActionMode> {
        match requested {
            Some(mode) if !mode.is_bulk() => self.supports(mode).then_some(mode),
            Some(_) => None,
            None => ActionMode::RECORD.into_iter().find(|m| self.supports(*m)),
        }
    }

    pub fn is_visible(&self, record: &Record, ctx: &AdminContext) -> bool {
        self.visible.as_ref().is_none_or(|visible| visible(record, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: ActionInvocation) -> impl Future<Output = anyhow::Result<ActionOutcome>> + Send {
        async { Ok(ActionOutcome::new("done")) }
    }

    #[test]
    fn record_mode_prefers_show_page() {
        let action = Action::new("ship", noop);
        assert_eq!(action.record_mode(None), Some(ActionMode::ShowPage));
        assert_eq!(action.record_mode(Some(ActionMode::EditForm)), Some(ActionMode::EditForm));
        assert_eq!(action.record_mode(Some(ActionMode::BulkIndex)), None);

        let bulk_only = Action::new("archive", noop).modes([ActionMode::BulkIndex]);
        assert_eq!(bulk_only.record_mode(None), None);
        assert!(bulk_only.supports(ActionMode::BulkIndex));
    }

    #[test]
    fn mode_string_forms() {
        assert_eq!(ActionMode::BulkIndex.to_string(), "bulk");
        assert_eq!("menu_item".parse::<ActionMode>().unwrap(), ActionMode::MenuItem);
    }
}
