use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::Subject;
use crate::error::AdminError;
use crate::http::{html, AdminState, Format, Payload};
use crate::resource::{ActionMode, ActionOutcome, View};
use crate::services::{ActionRequest, ListParams, Submission, ViewModel};

type Subjects = Extension<Option<Subject>>;
type Pairs = Query<Vec<(String, String)>>;

/// An error rendered in the format the request asked for.
pub struct PageError(Format, AdminError);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let PageError(format, error) = self;
        match format {
            Format::Json => error.into_response(),
            Format::Html => (error.status(), Html(html::error_page(&error))).into_response(),
        }
    }
}

type PageResult = Result<Response, PageError>;

trait OrPage<T> {
    fn or_page(self, format: Format) -> Result<T, PageError>;
}

impl<T> OrPage<T> for Result<T, AdminError> {
    fn or_page(self, format: Format) -> Result<T, PageError> {
        self.map_err(|e| PageError(format, e))
    }
}

fn see_other(location: String) -> Response {
    (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
}

fn page(state: &AdminState, format: Format, model: &ViewModel, status: StatusCode) -> Response {
    match format {
        Format::Json => (status, Json(model)).into_response(),
        Format::Html => (status, Html(html::view_page(&state.prefix, model))).into_response(),
    }
}

#[derive(Serialize)]
struct ActionResponse<'a> {
    success: bool,
    #[serde(flatten)]
    outcome: &'a ActionOutcome,
}

pub async fn menu(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    headers: HeaderMap,
) -> PageResult {
    let format = Format::from_headers(&headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let menus = state.admin.menus(&ctx);

    Ok(match format {
        Format::Json => Json(json!({ "menus": menus })).into_response(),
        Format::Html => Html(html::menu_page(&state.prefix, &menus)).into_response(),
    })
}

/// For routes whose last segment is fixed, so `.json` is part of the route.
fn format_of(uri: &Uri, headers: &HeaderMap) -> Format {
    if uri.path().ends_with(".json") {
        Format::Json
    } else {
        Format::from_headers(headers)
    }
}

pub async fn search(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    uri: Uri,
    headers: HeaderMap,
    Query(pairs): Pairs,
) -> PageResult {
    let format = format_of(&uri, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let keyword = ListParams::from_pairs(&pairs).keyword.unwrap_or_default();
    let results = state.admin.search_all(&keyword, &ctx).await.or_page(format)?;

    Ok(match format {
        Format::Json => Json(json!({ "keyword": keyword, "results": results })).into_response(),
        Format::Html => Html(html::search_page(&state.prefix, &keyword, &results)).into_response(),
    })
}

pub async fn list(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path(mut resource): Path<String>,
    headers: HeaderMap,
    Query(pairs): Pairs,
) -> PageResult {
    let format = Format::detect(&mut resource, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let params = ListParams::from_pairs(&pairs);
    debug!("GET {} {:?}", resource, params);

    let model = state.admin.list(&resource, &params, &ctx).await.or_page(format)?;
    Ok(page(&state, format, &model, StatusCode::OK))
}

pub async fn new_form(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path(resource): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> PageResult {
    let format = format_of(&uri, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let model = state.admin.new_form(&resource, &ctx).await.or_page(format)?;
    Ok(page(&state, format, &model, StatusCode::OK))
}

pub async fn show(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path((resource, mut id)): Path<(String, String)>,
    headers: HeaderMap,
) -> PageResult {
    let format = Format::detect(&mut id, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let model = state
        .admin
        .show(&resource, &id, View::Show, &ctx)
        .await
        .or_page(format)?;
    Ok(page(&state, format, &model, StatusCode::OK))
}

pub async fn edit(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> PageResult {
    let format = Format::from_headers(&headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let model = state
        .admin
        .show(&resource, &id, View::Edit, &ctx)
        .await
        .or_page(format)?;
    Ok(page(&state, format, &model, StatusCode::OK))
}

fn submitted(state: &AdminState, format: Format, submission: Submission, created: bool) -> Response {
    match submission {
        Submission::Saved(model) => match format {
            Format::Json if created => page(state, format, &model, StatusCode::CREATED),
            Format::Json => page(state, format, &model, StatusCode::OK),
            Format::Html => {
                let id = model
                    .record
                    .as_ref()
                    .map(|r| crate::backend::id_string(&r.id))
                    .unwrap_or_default();
                see_other(format!("{}/{}/{}", state.prefix, model.resource.param, id))
            }
        },
        Submission::Invalid(model) => page(state, format, &model, StatusCode::UNPROCESSABLE_ENTITY),
    }
}

pub async fn create(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path(mut resource): Path<String>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> PageResult {
    let format = Format::detect(&mut resource, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let submission = state.admin.create(&resource, payload, &ctx).await.or_page(format)?;
    Ok(submitted(&state, format, submission, true))
}

pub async fn update(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path((resource, mut id)): Path<(String, String)>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> PageResult {
    let format = Format::detect(&mut id, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let submission = state
        .admin
        .update(&resource, &id, payload, &ctx)
        .await
        .or_page(format)?;
    Ok(submitted(&state, format, submission, false))
}

pub async fn delete(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path((resource, mut id)): Path<(String, String)>,
    headers: HeaderMap,
) -> PageResult {
    let format = Format::detect(&mut id, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    state.admin.delete(&resource, &id, &ctx).await.or_page(format)?;

    Ok(match format {
        Format::Json => Json(json!({ "success": true, "id": id })).into_response(),
        Format::Html => see_other(format!("{}/{}", state.prefix, resource)),
    })
}

/// Reads `mode`, `ids` and `argument` out of an action body.
fn action_request(mut body: serde_json::Map<String, Value>, id: Option<String>) -> ActionRequest {
    let mode = body
        .get("mode")
        .and_then(Value::as_str)
        .and_then(|m| m.parse::<ActionMode>().ok());
    let ids = match body.remove("ids") {
        Some(Value::Array(ids)) => ids,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };
    let argument = match body.remove("argument") {
        Some(Value::Object(argument)) => Some(argument),
        _ => None,
    };
    ActionRequest {
        mode,
        id,
        ids,
        argument,
    }
}

fn acted(state: &AdminState, format: Format, outcome: ActionOutcome, back: String) -> Response {
    match format {
        Format::Json => Json(ActionResponse {
            success: true,
            outcome: &outcome,
        })
        .into_response(),
        Format::Html => {
            debug!("Action finished: {}", outcome.message);
            see_other(format!("{}{}", state.prefix, back))
        }
    }
}

pub async fn bulk_action(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path((resource, mut name)): Path<(String, String)>,
    headers: HeaderMap,
    Payload(body): Payload,
) -> PageResult {
    let format = Format::detect(&mut name, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let request = action_request(body, None);
    let outcome = state
        .admin
        .dispatch(&resource, &name, request, &ctx)
        .await
        .or_page(format)?;
    Ok(acted(&state, format, outcome, format!("/{}", resource)))
}

pub async fn record_action(
    State(state): State<AdminState>,
    Extension(subject): Subjects,
    Path((resource, id, mut name)): Path<(String, String, String)>,
    headers: HeaderMap,
    Payload(body): Payload,
) -> PageResult {
    let format = Format::detect(&mut name, &headers);
    let ctx = state.admin.context(subject).or_page(format)?;
    let request = action_request(body, Some(id.clone()));
    let outcome = state
        .admin
        .dispatch(&resource, &name, request, &ctx)
        .await
        .or_page(format)?;
    Ok(acted(&state, format, outcome, format!("/{}/{}", resource, id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_routes_take_format_from_the_path() {
        let uri: Uri = "/admin/orders/new.json".parse().unwrap();
        assert_eq!(format_of(&uri, &HeaderMap::new()), Format::Json);

        let uri: Uri = "/admin/orders/new".parse().unwrap();
        assert_eq!(format_of(&uri, &HeaderMap::new()), Format::Html);
    }

    #[test]
    fn action_body_accepts_single_id_and_mode() {
        let body = json!({"ids": 7, "mode": "edit", "argument": {"carrier": "DHL"}});
        let request = action_request(body.as_object().cloned().unwrap(), None);
        assert_eq!(request.ids, vec![json!(7)]);
        assert_eq!(request.mode, Some(ActionMode::EditForm));
        assert_eq!(request.argument.unwrap()["carrier"], "DHL");
    }
}
