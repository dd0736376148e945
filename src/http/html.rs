//! Bare-bones HTML for the admin pages. Everything a page shows comes from
//! the same [`ViewModel`] the JSON API returns.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backend::id_string;
use crate::error::AdminError;
use crate::resource::{MetaKind, View};
use crate::services::{FieldEntry, FieldView, MenuItem, RecordView, SearchGroup, ViewModel};

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, theme: Option<&str>, body: &str) -> String {
    let theme = theme.map(|t| format!(" class=\"theme-{}\"", escape(t))).unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body{}>\n{}\n</body>\n</html>\n",
        escape(title),
        theme,
        body
    )
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        other => escape(&id_string(other)),
    }
}

pub fn error_page(error: &AdminError) -> String {
    let mut body = format!("<h1>{}</h1>\n<p>{}</p>\n", error.status(), escape(&error.to_string()));
    let fields = error.field_errors();
    if !fields.is_empty() {
        body.push_str("<ul>\n");
        for field in fields {
            let _ = writeln!(body, "<li>{}: {}</li>", escape(&field.field), escape(&field.message));
        }
        body.push_str("</ul>\n");
    }
    layout("Error", None, &body)
}

fn menu_list(prefix: &str, items: &[MenuItem], out: &mut String) {
    out.push_str("<ul>\n");
    for item in items {
        match &item.param {
            Some(param) => {
                let _ = writeln!(out, "<li><a href=\"{}/{}\">{}</a></li>", prefix, escape(param), escape(&item.label));
            }
            None => {
                let _ = write!(out, "<li>{}", escape(&item.label));
                menu_list(prefix, &item.children, out);
                out.push_str("</li>\n");
            }
        }
    }
    out.push_str("</ul>\n");
}

fn search_form(prefix: &str, keyword: &str) -> String {
    format!(
        "<form method=\"get\" action=\"{}/search\"><input type=\"search\" name=\"keyword\" value=\"{}\"><button>Search</button></form>\n",
        prefix,
        escape(keyword)
    )
}

pub fn menu_page(prefix: &str, menus: &[MenuItem]) -> String {
    let mut body = String::from("<h1>Admin</h1>\n");
    body.push_str(&search_form(prefix, ""));
    menu_list(prefix, menus, &mut body);
    layout("Admin", None, &body)
}

pub fn search_page(prefix: &str, keyword: &str, results: &[SearchGroup]) -> String {
    let mut body = format!("<h1>Search: {}</h1>\n", escape(keyword));
    body.push_str(&search_form(prefix, keyword));
    if results.is_empty() {
        body.push_str("<p>No results.</p>\n");
    }
    for group in results {
        let _ = writeln!(body, "<h2>{} ({})</h2>\n<ul>", escape(&group.resource.label), group.total);
        for record in &group.records {
            let _ = writeln!(
                body,
                "<li><a href=\"{}/{}/{}\">{}</a></li>",
                prefix,
                escape(&group.resource.param),
                escape(&id_string(&record.id)),
                escape(&record.title)
            );
        }
        body.push_str("</ul>\n");
    }
    layout("Search", None, &body)
}

pub fn view_page(prefix: &str, model: &ViewModel) -> String {
    let body = match model.view {
        View::Index => index_body(prefix, model),
        View::Show => show_body(prefix, model),
        View::New | View::Edit => form_body(prefix, model),
    };
    layout(&model.resource.label, model.resource.theme.as_deref(), &body)
}

fn flat_fields(model: &ViewModel) -> Vec<&FieldView> {
    model.fields.iter().flat_map(FieldEntry::views).collect()
}

fn index_body(prefix: &str, model: &ViewModel) -> String {
    let base = format!("{}/{}", prefix, escape(&model.resource.param));
    let mut body = format!("<h1>{}</h1>\n", escape(&model.resource.label));
    if model.capabilities.create {
        let _ = writeln!(body, "<p><a href=\"{}/new\">New</a></p>", base);
    }

    let _ = write!(
        body,
        "<form method=\"get\" action=\"{}\"><input type=\"search\" name=\"keyword\" value=\"{}\">",
        base,
        escape(model.search.keyword.as_deref().unwrap_or_default())
    );
    for scope in &model.scopes {
        let key = match &scope.group {
            Some(group) => format!("scope[{}]", escape(group)),
            None => "scopes[]".to_string(),
        };
        let _ = write!(
            body,
            "<label><input type=\"checkbox\" name=\"{}\" value=\"{}\"{}> {}</label>",
            key,
            escape(&scope.name),
            if scope.active { " checked" } else { "" },
            escape(&scope.label)
        );
    }
    body.push_str("<button>Filter</button></form>\n");

    let fields = flat_fields(model);
    body.push_str("<table>\n<thead><tr><th></th>");
    for field in &fields {
        let _ = write!(body, "<th>{}</th>", escape(&field.label));
    }
    body.push_str("<th></th></tr></thead>\n<tbody>\n");
    for record in &model.records {
        let id = escape(&id_string(&record.id));
        let _ = write!(body, "<tr><td><input type=\"checkbox\" form=\"bulk\" name=\"ids[]\" value=\"{}\"></td>", id);
        for field in &fields {
            let value = record.values.get(&field.name).unwrap_or(&Value::Null);
            let _ = write!(body, "<td>{}</td>", display(value));
        }
        let _ = write!(body, "<td><a href=\"{}/{}\">Show</a>", base, id);
        for action in &record.actions {
            let _ = write!(
                body,
                " <form method=\"post\" action=\"{}/{}/actions/{}\"><input type=\"hidden\" name=\"mode\" value=\"menu_item\"><button>{}</button></form>",
                base,
                id,
                escape(action),
                escape(action)
            );
        }
        body.push_str("</td></tr>\n");
    }
    body.push_str("</tbody>\n</table>\n");

    if !model.actions.is_empty() {
        body.push_str("<form id=\"bulk\" method=\"post\">\n");
        for action in &model.actions {
            let _ = writeln!(
                body,
                "<button formaction=\"{}/actions/{}\">{}</button>",
                base,
                escape(&action.name),
                escape(&action.label)
            );
        }
        body.push_str("</form>\n");
    }

    if let Some(pagination) = &model.pagination {
        let _ = writeln!(
            body,
            "<p>Page {} of {} ({} records)</p>",
            pagination.page,
            pagination.pages.max(1),
            pagination.total
        );
    }
    body
}

fn show_body(prefix: &str, model: &ViewModel) -> String {
    let base = format!("{}/{}", prefix, escape(&model.resource.param));
    let Some(record) = &model.record else {
        return String::new();
    };
    let id = escape(&id_string(&record.id));
    let mut body = format!("<h1>{}</h1>\n", escape(&record.title));

    for entry in &model.fields {
        match entry {
            FieldEntry::Field(field) => show_row(&mut body, field, record),
            FieldEntry::Section { title, rows } => {
                let _ = writeln!(body, "<fieldset><legend>{}</legend>", escape(title));
                for field in rows.iter().flatten() {
                    show_row(&mut body, field, record);
                }
                body.push_str("</fieldset>\n");
            }
        }
    }

    if model.capabilities.update {
        let _ = writeln!(body, "<p><a href=\"{}/{}/edit\">Edit</a></p>", base, id);
    }
    if model.capabilities.delete {
        let _ = writeln!(
            body,
            "<form method=\"post\" action=\"{}/{}/delete\"><button>Delete</button></form>",
            base, id
        );
    }
    action_forms(&mut body, &base, &id, model, "show");
    body
}

fn show_row(body: &mut String, field: &FieldView, record: &RecordView) {
    let value = record.values.get(&field.name).unwrap_or(&Value::Null);
    let _ = writeln!(body, "<p><strong>{}</strong>: {}</p>", escape(&field.label), display(value));
}

fn action_forms(body: &mut String, base: &str, id: &str, model: &ViewModel, mode: &str) {
    for action in &model.actions {
        let _ = write!(
            body,
            "<form method=\"post\" action=\"{}/{}/actions/{}\"><input type=\"hidden\" name=\"mode\" value=\"{}\">",
            base,
            id,
            escape(&action.name),
            mode
        );
        for field in action.argument.iter().flat_map(FieldEntry::views) {
            input(body, field, &Value::Null, &format!("argument[{}]", field.name));
        }
        let _ = writeln!(body, "<button>{}</button></form>", escape(&action.label));
    }
}

/// `datetime-local` takes no offset: stored timestamps are shown in UTC,
/// which is how submitted values are read back.
fn datetime_local(value: &Value) -> String {
    let raw = id_string(value);
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => ts.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S").to_string(),
        Err(_) => raw,
    }
}

fn input(body: &mut String, field: &FieldView, value: &Value, name: &str) {
    let label = escape(&field.label);
    let name = escape(name);
    let required = if field.required { " required" } else { "" };
    let _ = write!(body, "<p><label>{} ", label);

    if field.readonly {
        let _ = write!(body, "{}</label></p>", display(value));
        return;
    }

    if let Some(options) = &field.options {
        let multiple = if field.kind == MetaKind::SelectMany { " multiple" } else { "" };
        let _ = write!(body, "<select name=\"{}\"{}{}><option value=\"\"></option>", name, multiple, required);
        for option in options {
            let selected = match value {
                Value::Array(values) => values.iter().any(|v| crate::backend::loose_eq(v, &option.value)),
                other => crate::backend::loose_eq(other, &option.value),
            };
            let _ = write!(
                body,
                "<option value=\"{}\"{}>{}</option>",
                escape(&id_string(&option.value)),
                if selected { " selected" } else { "" },
                escape(&option.label)
            );
        }
        body.push_str("</select></label></p>\n");
        return;
    }

    let raw = match field.kind {
        MetaKind::DateTime => escape(&datetime_local(value)),
        _ => escape(&id_string(value)),
    };
    let _ = match field.kind {
        MetaKind::Textarea | MetaKind::RichText => {
            write!(body, "<textarea name=\"{}\"{}>{}</textarea>", name, required, raw)
        }
        MetaKind::Checkbox => write!(
            body,
            "<input type=\"hidden\" name=\"{0}\" value=\"false\"><input type=\"checkbox\" name=\"{0}\" value=\"true\"{1}>",
            name,
            if value.as_bool().unwrap_or(false) { " checked" } else { "" }
        ),
        MetaKind::Password => write!(body, "<input type=\"password\" name=\"{}\">", name),
        MetaKind::Hidden => write!(body, "<input type=\"hidden\" name=\"{}\" value=\"{}\">", name, raw),
        kind => {
            let input_type = match kind {
                MetaKind::Number | MetaKind::Float => "number",
                MetaKind::Date => "date",
                MetaKind::DateTime => "datetime-local",
                _ => "text",
            };
            let step = match kind {
                MetaKind::Float => " step=\"any\"",
                MetaKind::DateTime => " step=\"1\"",
                _ => "",
            };
            write!(
                body,
                "<input type=\"{}\" name=\"{}\" value=\"{}\"{}{}>",
                input_type, name, raw, step, required
            )
        }
    };
    body.push_str("</label></p>\n");
}

fn form_body(prefix: &str, model: &ViewModel) -> String {
    let base = format!("{}/{}", prefix, escape(&model.resource.param));
    let (title, action) = match &model.record {
        Some(record) if model.view == View::Edit => (
            format!("Edit {}", record.title),
            format!("{}/{}", base, escape(&id_string(&record.id))),
        ),
        _ => (format!("New {}", model.resource.label), base.clone()),
    };

    let mut body = format!("<h1>{}</h1>\n", escape(&title));
    if !model.errors.is_empty() {
        body.push_str("<ul class=\"errors\">\n");
        for error in &model.errors {
            let _ = writeln!(body, "<li>{}: {}</li>", escape(&error.field), escape(&error.message));
        }
        body.push_str("</ul>\n");
    }

    let _ = writeln!(body, "<form method=\"post\" action=\"{}\">", action);
    let value_of = |field: &FieldView| {
        model
            .record
            .as_ref()
            .and_then(|r| r.values.get(&field.name))
            .cloned()
            .unwrap_or(Value::Null)
    };
    for entry in &model.fields {
        match entry {
            FieldEntry::Field(field) => input(&mut body, field, &value_of(field), &field.name),
            FieldEntry::Section { title, rows } => {
                let _ = writeln!(body, "<fieldset><legend>{}</legend>", escape(title));
                for field in rows.iter().flatten() {
                    input(&mut body, field, &value_of(field), &field.name);
                }
                body.push_str("</fieldset>\n");
            }
        }
    }
    body.push_str("<button>Save</button>\n</form>\n");

    if let Some(record) = model.record.as_ref().filter(|_| model.view == View::Edit) {
        let id = escape(&id_string(&record.id));
        action_forms(&mut body, &base, &id, model, "edit");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>\"Tom & Jerry\"</b>"), "&lt;b&gt;&quot;Tom &amp; Jerry&quot;&lt;/b&gt;");
    }

    #[test]
    fn arrays_display_as_lists() {
        assert_eq!(display(&serde_json::json!(["a", 1, null])), "a, 1, ");
    }

    #[test]
    fn datetime_inputs_drop_the_offset() {
        let field = FieldView {
            name: "shipped_at".to_string(),
            label: "Shipped at".to_string(),
            kind: MetaKind::DateTime,
            required: false,
            readonly: false,
            options: None,
        };
        let mut body = String::new();
        input(&mut body, &field, &serde_json::json!("2025-03-04T10:00:00+02:00"), "shipped_at");
        assert!(
            body.contains("type=\"datetime-local\" name=\"shipped_at\" value=\"2025-03-04T08:00:00\""),
            "{}",
            body
        );

        assert_eq!(datetime_local(&Value::Null), "");
        assert_eq!(datetime_local(&serde_json::json!("2025-03-04T08:00")), "2025-03-04T08:00");
    }
}
