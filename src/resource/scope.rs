use std::fmt;
use std::sync::Arc;

use crate::auth::AdminContext;
use crate::backend::Query;
use crate::resource::field::humanize;

pub type ScopeFn = Arc<dyn Fn(Query, &AdminContext) -> Query + Send + Sync>;

/// A named, selectable filter over a resource's list.
///
/// Scopes sharing a group are mutually exclusive within one request.
#[derive(Clone)]
pub struct Scope {
    name: String,
    label: String,
    group: Option<String>,
    default: bool,
    handler: ScopeFn,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl Scope {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Query, &AdminContext) -> Query + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            label: humanize(&name),
            name,
            group: None,
            default: false,
            handler: Arc::new(handler),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Applied when nothing else in its group is selected.
    pub fn default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_text(&self) -> &str {
        &self.label
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn apply(&self, query: Query, ctx: &AdminContext) -> Query {
        (self.handler)(query, ctx)
    }
}
