//! Turns submitted payloads into storable records, one Meta at a time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::auth::AdminContext;
use crate::backend::Record;
use crate::error::FieldError;
use crate::registry::Registry;
use crate::resource::{FieldKind, Meta, MetaKind, OptionSource, ProjectedField, Resource};

fn blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        other => text(other)
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| "must be a whole number".to_string()),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        other => text(other).parse::<f64>().ok(),
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| "must be a number".to_string())
}

fn coerce_decimal(value: &Value) -> Result<Value, String> {
    let decimal = text(value)
        .parse::<Decimal>()
        .map_err(|_| "must be a decimal number".to_string())?;
    decimal
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| "is out of range".to_string())
}

fn coerce_bool(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Null => Ok(Value::Bool(false)),
        other => match text(other).to_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "off" | "0" | "no" | "" => Ok(Value::Bool(false)),
            _ => Err("must be true or false".to_string()),
        },
    }
}

fn coerce_date(value: &Value) -> Result<Value, String> {
    NaiveDate::parse_from_str(&text(value), "%Y-%m-%d")
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .map_err(|_| "must be a date (YYYY-MM-DD)".to_string())
}

/// Accepts RFC 3339 and the `datetime-local` form input format (read as UTC).
fn coerce_datetime(value: &Value) -> Result<Value, String> {
    let raw = text(value);
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Value::String(ts.to_rfc3339()));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|naive| Value::String(naive.and_utc().to_rfc3339()))
        .ok_or_else(|| "must be a date and time".to_string())
}

fn coerce_time(value: &Value) -> Result<Value, String> {
    let raw = text(value);
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&raw, format).ok())
        .map(|t| Value::String(t.format("%H:%M:%S").to_string()))
        .ok_or_else(|| "must be a time".to_string())
}

fn coerce_uuid(value: &Value) -> Result<Value, String> {
    Uuid::parse_str(&text(value))
        .map(|id| Value::String(id.to_string()))
        .map_err(|_| "must be a UUID".to_string())
}

/// Coerces by storage kind first, falling back to the UI type for metas
/// without a reflected field.
fn coerce(registry: &Registry, meta: &Meta, value: &Value) -> Result<Value, String> {
    match meta.field_kind() {
        Some(FieldKind::Integer) => coerce_integer(value),
        Some(FieldKind::Float) => coerce_float(value),
        Some(FieldKind::Decimal) => coerce_decimal(value),
        Some(FieldKind::Boolean) => coerce_bool(value),
        Some(FieldKind::Date) => coerce_date(value),
        Some(FieldKind::DateTime) => coerce_datetime(value),
        Some(FieldKind::Time) => coerce_time(value),
        Some(FieldKind::Uuid) => coerce_uuid(value),
        Some(FieldKind::BelongsTo(target)) => {
            // Foreign keys take the type of the target's primary key.
            let target_pk = registry
                .target(target)
                .ok()
                .and_then(|r| {
                    r.fields()
                        .iter()
                        .find(|f| f.name == r.primary_key())
                        .map(|f| f.kind.clone())
                });
            match target_pk {
                Some(FieldKind::Integer) => coerce_integer(value),
                Some(FieldKind::Uuid) => coerce_uuid(value),
                _ => Ok(Value::String(text(value))),
            }
        }
        Some(FieldKind::String | FieldKind::Text) => Ok(match value {
            Value::String(_) => value.clone(),
            other => Value::String(text(other)),
        }),
        Some(FieldKind::Enum(_) | FieldKind::HasMany(_) | FieldKind::Opaque(_)) => Ok(value.clone()),
        None => match meta.kind() {
            MetaKind::Number => coerce_integer(value),
            MetaKind::Float => coerce_float(value),
            MetaKind::Checkbox => coerce_bool(value),
            MetaKind::Date => coerce_date(value),
            MetaKind::DateTime => coerce_datetime(value),
            _ => Ok(value.clone()),
        },
    }
}

fn check_option(meta: &Meta, value: &Value) -> Result<(), String> {
    if meta.kind() != MetaKind::SelectOne {
        return Ok(());
    }
    match meta.options() {
        Some(OptionSource::Static(options))
            if !options.iter().any(|o| crate::backend::loose_eq(&o.value, value)) =>
        {
            Err("is not an allowed choice".to_string())
        }
        _ => Ok(()),
    }
}

/// Decodes `payload` through `fields` into a record ready for storage.
///
/// `existing` is the stored record on update; `None` on create. Fields
/// missing from the payload are left alone on update and checked for
/// presence on create. Password values are hashed; a blank password on
/// update keeps the stored one.
pub fn decode(
    registry: &Registry,
    resource: &Resource,
    fields: &[&ProjectedField<'_>],
    payload: &Record,
    existing: Option<&Record>,
    ctx: &AdminContext,
) -> Result<Record, Vec<FieldError>> {
    let mut record = Record::new();
    let mut errors = Vec::new();

    for field in fields.iter().filter(|f| !f.is_nested()) {
        let meta = field.meta;
        if !meta.is_writable() {
            continue;
        }

        let Some(raw) = payload.get(meta.name()) else {
            let unchecked_box = meta.kind() == MetaKind::Checkbox && existing.is_none();
            if unchecked_box {
                if let Some(column) = meta.column() {
                    record.insert(column.to_string(), Value::Bool(false));
                }
            } else if existing.is_none() && meta.is_required() {
                errors.push(FieldError::new(meta.name(), "can't be blank"));
            }
            continue;
        };

        if meta.kind() == MetaKind::Password {
            match (blank(raw), existing) {
                (true, Some(_)) => {}
                (true, None) if meta.is_required() => {
                    errors.push(FieldError::new(meta.name(), "can't be blank"));
                }
                (true, None) => {}
                (false, _) => match bcrypt::hash(text(raw), bcrypt::DEFAULT_COST) {
                    Ok(hash) => {
                        if let Some(column) = meta.column() {
                            record.insert(column.to_string(), Value::String(hash));
                        }
                    }
                    Err(e) => errors.push(FieldError::new(meta.name(), e.to_string())),
                },
            }
            continue;
        }

        if let Some(setter) = meta.setter() {
            if let Err(message) = setter(&mut record, raw.clone(), ctx) {
                errors.push(FieldError::new(meta.name(), message));
            }
            continue;
        }

        let Some(column) = meta.column() else {
            continue;
        };

        if blank(raw) && meta.kind() != MetaKind::Checkbox {
            if meta.is_required() {
                errors.push(FieldError::new(meta.name(), "can't be blank"));
                continue;
            }
            let empty = match meta.field_kind() {
                Some(FieldKind::String | FieldKind::Text) => Value::String(String::new()),
                _ => Value::Null,
            };
            record.insert(column.to_string(), empty);
            continue;
        }

        match coerce(registry, meta, raw).and_then(|v| check_option(meta, &v).map(|_| v)) {
            Ok(value) => {
                record.insert(column.to_string(), value);
            }
            Err(message) => errors.push(FieldError::new(meta.name(), message)),
        }
    }

    if errors.is_empty() {
        let mut merged = existing.cloned().unwrap_or_default();
        merged.extend(record.clone());
        for validator in resource.validators() {
            errors.extend(validator(&merged, ctx));
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_flags_coerce_from_form_strings() {
        assert_eq!(coerce_integer(&json!("42")), Ok(json!(42)));
        assert!(coerce_integer(&json!("4.2")).is_err());
        assert_eq!(coerce_float(&json!("4.5")), Ok(json!(4.5)));
        assert_eq!(coerce_decimal(&json!("19.99")), Ok(json!(19.99)));
        assert_eq!(coerce_bool(&json!("on")), Ok(json!(true)));
        assert_eq!(coerce_bool(&json!("0")), Ok(json!(false)));
    }

    #[test]
    fn temporal_values_are_normalised() {
        assert_eq!(coerce_date(&json!("2024-05-01")), Ok(json!("2024-05-01")));
        assert!(coerce_date(&json!("05/01/2024")).is_err());
        assert_eq!(
            coerce_datetime(&json!("2024-05-01T10:30")),
            Ok(json!("2024-05-01T10:30:00+00:00"))
        );
        assert_eq!(
            coerce_datetime(&json!("2025-03-04T08:00:00")),
            Ok(json!("2025-03-04T08:00:00+00:00"))
        );
        assert_eq!(coerce_time(&json!("09:15")), Ok(json!("09:15:00")));
    }
}
