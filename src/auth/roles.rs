use std::sync::Arc;

use crate::auth::{AdminContext, RoleSet, Subject};

type RoleChecker = Arc<dyn Fn(&Subject) -> bool + Send + Sync>;

/// Roles derived from the subject at request time, in addition to the
/// roles carried by its token.
#[derive(Clone, Default)]
pub struct Roles {
    checkers: Vec<(String, RoleChecker)>,
}

impl Roles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, checker: F) -> &mut Self
    where
        F: Fn(&Subject) -> bool + Send + Sync + 'static,
    {
        self.checkers.push((name.into(), Arc::new(checker)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checkers.iter().map(|(name, _)| name.as_str())
    }

    /// Role set for one request. Runs every checker again; callers must not
    /// keep the result past the request.
    pub fn resolve(&self, subject: Option<&Subject>) -> RoleSet {
        let Some(subject) = subject else {
            return RoleSet::new();
        };

        let mut roles: RoleSet = subject.roles.iter().cloned().collect();
        for (name, checker) in &self.checkers {
            if checker(subject) {
                roles.insert(name.clone());
            }
        }
        roles
    }

    pub fn context(&self, subject: Option<Subject>) -> AdminContext {
        let roles = self.resolve(subject.as_ref());
        AdminContext { subject, roles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_roles_join_token_roles() {
        let mut roles = Roles::new();
        roles.register("staff", |s: &Subject| {
            s.email.as_deref().is_some_and(|e| e.ends_with("@shop.test"))
        });

        let mut subject = Subject::new("1").with_roles(["viewer"]);
        subject.email = Some("ann@shop.test".into());

        let ctx = roles.context(Some(subject));
        assert!(ctx.has_role("viewer"));
        assert!(ctx.has_role("staff"));
    }

    #[test]
    fn anonymous_has_no_roles() {
        let mut roles = Roles::new();
        roles.register("everyone", |_: &Subject| true);
        assert!(roles.resolve(None).is_empty());
    }
}
