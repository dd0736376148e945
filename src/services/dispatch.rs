use serde_json::Value;
use tracing::{info, warn};

use crate::auth::{allowed, AdminContext, Target, Verb};
use crate::backend::{Predicate, Table};
use crate::error::{AdminError, AdminResult};
use crate::resource::{flatten, project, ActionInvocation, ActionMode, ActionOutcome, View};
use crate::services::admin::{ActionRequest, AdminService};
use crate::services::decode::decode;

impl AdminService {
    /// Runs a resource action.
    ///
    /// The action and mode are resolved first, then permission (update on
    /// the action, else the resource), then the argument is decoded through
    /// its own resource, then target records are loaded and filtered by
    /// visibility. The handler runs once; nothing is retried or rolled back.
    pub async fn dispatch(
        &self,
        param: &str,
        name: &str,
        request: ActionRequest,
        ctx: &AdminContext,
    ) -> AdminResult<ActionOutcome> {
        let registry = self.registry();
        let resource = registry.by_param(param)?;
        let not_found = || AdminError::ActionNotFound {
            resource: resource.name().to_string(),
            action: name.to_string(),
        };

        let action = resource.action_named(name).ok_or_else(not_found)?;
        let mode = match &request.id {
            Some(_) => action.record_mode(request.mode),
            None => match request.mode {
                None | Some(ActionMode::BulkIndex) => {
                    action.supports(ActionMode::BulkIndex).then_some(ActionMode::BulkIndex)
                }
                Some(_) => None,
            },
        }
        .ok_or_else(not_found)?;

        let target = Target::Action(resource, action);
        if !allowed(&ctx.roles, Verb::Update, target) {
            warn!("🚫 Action {} denied for roles {:?}", target.describe(), ctx.roles);
            return Err(AdminError::forbidden(Verb::Update, target.describe()));
        }

        let argument = match action.argument_target() {
            Some(argument_target) => {
                let argument_resource = registry.target(argument_target)?;
                let projected = project(registry, argument_resource, View::New)?;
                let payload = request.argument.clone().unwrap_or_default();
                let decoded = decode(registry, argument_resource, &flatten(&projected), &payload, None, ctx)
                    .map_err(|errors| AdminError::InvalidArgument {
                        action: name.to_string(),
                        errors,
                    })?;
                Some(decoded)
            }
            None => None,
        };

        let backend = self.backend();
        let records = match &request.id {
            Some(id) => vec![self.find_record(resource, id).await?],
            None if request.ids.is_empty() => Vec::new(),
            None => {
                let ids = request
                    .ids
                    .iter()
                    .map(|id| match id {
                        Value::String(s) => AdminService::parse_id(resource, s),
                        other => other.clone(),
                    })
                    .collect();
                let query = backend
                    .query(resource)
                    .filter(Predicate::is_in(resource.primary_key(), ids));
                backend.fetch_many(&query).await?
            }
        };

        let selected = records.len();
        let records: Vec<_> = records
            .into_iter()
            .filter(|r| action.is_visible(r, ctx))
            .collect();
        if records.len() < selected {
            info!(
                "Skipping {} records hidden from action {}",
                selected - records.len(),
                target.describe()
            );
        }

        let invocation = ActionInvocation {
            resource: resource.name().to_string(),
            action: name.to_string(),
            mode,
            records,
            argument,
            context: ctx.clone(),
            backend,
            table: Table::from(resource),
        };

        match action.handler().call(invocation).await {
            Ok(outcome) => {
                info!("⚡ Action {} ({}) done: {}", target.describe(), mode, outcome.message);
                Ok(outcome)
            }
            Err(source) => {
                warn!("❌ Action {} failed: {:#}", target.describe(), source);
                Err(AdminError::ActionFailed {
                    action: name.to_string(),
                    source,
                })
            }
        }
    }
}
