use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde_json::{Map, Value};

use crate::backend::Record;
use crate::error::{AdminError, FieldError};

/// A request body as a record: JSON objects as sent, url-encoded forms
/// folded into the same shape.
///
/// Form keys ending in `[]` collect into arrays and `outer[inner]` keys
/// into nested objects. For repeated plain keys the last value wins.
#[derive(Debug, Clone, Default)]
pub struct Payload(pub Record);

fn invalid_body(message: impl Into<String>) -> AdminError {
    AdminError::ValidationFailed(vec![FieldError::new("body", message)])
}

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = AdminError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| invalid_body(e.body_text()))?;
            return match value {
                Value::Object(record) => Ok(Payload(record)),
                Value::Null => Ok(Payload::default()),
                _ => Err(invalid_body("expected a JSON object")),
            };
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| invalid_body(e.body_text()))?;
            return Ok(Payload(fold_pairs(pairs)));
        }

        Ok(Payload::default())
    }
}

pub fn fold_pairs(pairs: Vec<(String, String)>) -> Record {
    let mut record = Map::new();
    for (key, value) in pairs {
        if let Some(base) = key.strip_suffix("[]") {
            let entry = record
                .entry(base.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(items) => items.push(Value::String(value)),
                other => *other = Value::Array(vec![Value::String(value)]),
            }
        } else if let Some((outer, inner)) = key
            .strip_suffix(']')
            .and_then(|k| k.split_once('['))
        {
            let entry = record
                .entry(outer.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(nested) = entry {
                nested.insert(inner.to_string(), Value::String(value));
            }
        } else {
            record.insert(key, Value::String(value));
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn form_pairs_fold_into_record() {
        let record = fold_pairs(pairs(&[
            ("ids[]", "1"),
            ("ids[]", "2"),
            ("argument[carrier]", "DHL"),
            ("active", "false"),
            ("active", "true"),
        ]));
        assert_eq!(
            Value::Object(record),
            json!({
                "ids": ["1", "2"],
                "argument": {"carrier": "DHL"},
                "active": "true",
            })
        );
    }
}
