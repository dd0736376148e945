use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::auth::RoleSet;
use crate::resource::{Action, Meta, Resource};

/// Matches every caller, including anonymous ones.
pub const ANYONE: &str = "*";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

impl Verb {
    pub const CRUD: [Verb; 4] = [Verb::Create, Verb::Read, Verb::Update, Verb::Delete];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub effect: Effect,
    pub verb: Verb,
    pub role: String,
}

/// An immutable allow/deny rule set attached to a resource, meta or action.
///
/// Declaring a rule set at all switches its owner to deny-unless-granted;
/// owners without one are open to everybody.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permission {
    grants: Vec<Grant>,
}

impl Permission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(self, verb: Verb, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Effect::Allow, &[verb], roles)
    }

    pub fn deny<I, S>(self, verb: Verb, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Effect::Deny, &[verb], roles)
    }

    /// Allow every CRUD verb for the given roles.
    pub fn allow_all<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Effect::Allow, &Verb::CRUD, roles)
    }

    pub fn deny_all<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Effect::Deny, &Verb::CRUD, roles)
    }

    fn push<I, S>(mut self, effect: Effect, verbs: &[Verb], roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        for verb in verbs {
            for role in &roles {
                self.grants.push(Grant {
                    effect,
                    verb: *verb,
                    role: role.clone(),
                });
            }
        }
        self
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Deny is sticky across roles; otherwise any allowing role wins.
    pub fn has_permission(&self, verb: Verb, roles: &RoleSet) -> bool {
        let applies = |grant: &&Grant| {
            grant.verb == verb && (grant.role == ANYONE || roles.contains(&grant.role))
        };

        if self
            .grants
            .iter()
            .filter(applies)
            .any(|g| g.effect == Effect::Deny)
        {
            return false;
        }

        self.grants
            .iter()
            .filter(applies)
            .any(|g| g.effect == Effect::Allow)
    }
}

/// What a permission check is asked about.
#[derive(Clone, Copy)]
pub enum Target<'a> {
    Resource(&'a Resource),
    Meta(&'a Resource, &'a Meta),
    Action(&'a Resource, &'a Action),
}

impl Target<'_> {
    /// Nearest declared rule set: own rules first, then the resource's.
    fn rules(&self) -> Option<&Permission> {
        match self {
            Target::Resource(resource) => resource.rules(),
            Target::Meta(resource, meta) => meta.permission().or_else(|| resource.rules()),
            Target::Action(resource, action) => {
                action.rules().or_else(|| resource.rules())
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Target::Resource(resource) => resource.name().to_string(),
            Target::Meta(resource, meta) => format!("{}.{}", resource.name(), meta.name()),
            Target::Action(resource, action) => {
                format!("{} action {}", resource.name(), action.name())
            }
        }
    }
}

/// Resolves `verb` for the request's roles against `target`.
///
/// Evaluated per request; nothing here is cached.
pub fn allowed(roles: &RoleSet, verb: Verb, target: Target<'_>) -> bool {
    match target.rules() {
        Some(rules) => rules.has_permission(verb, roles),
        None => true,
    }
}
