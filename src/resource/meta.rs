use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::auth::{AdminContext, Permission};
use crate::backend::Record;
use crate::resource::field::{humanize, AssocTarget, FieldDef, FieldKind};

/// UI type of a meta. Exactly one is active per descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetaKind {
    Text,
    Textarea,
    RichText,
    Password,
    Number,
    Float,
    Checkbox,
    Date,
    DateTime,
    SelectOne,
    SelectMany,
    Hidden,
    Readonly,
}

impl MetaKind {
    /// Inference table from the underlying field kind.
    pub fn infer(kind: &FieldKind) -> Option<MetaKind> {
        match kind {
            FieldKind::Date => Some(MetaKind::Date),
            FieldKind::DateTime => Some(MetaKind::DateTime),
            FieldKind::Boolean => Some(MetaKind::Checkbox),
            FieldKind::Enum(_) | FieldKind::BelongsTo(_) => Some(MetaKind::SelectOne),
            FieldKind::HasMany(_) => Some(MetaKind::SelectMany),
            FieldKind::Integer => Some(MetaKind::Number),
            FieldKind::Float | FieldKind::Decimal => Some(MetaKind::Float),
            FieldKind::Text => Some(MetaKind::Textarea),
            FieldKind::String | FieldKind::Uuid | FieldKind::Time => Some(MetaKind::Text),
            FieldKind::Opaque(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Where a select meta gets its choices from.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionSource {
    Static(Vec<SelectOption>),
    Resource(AssocTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub target: AssocTarget,
    pub cardinality: Cardinality,
    /// Column on the owning table (belongs-to) or on the target table
    /// (has-many).
    pub foreign_key: String,
}

pub type Valuer = Arc<dyn Fn(&Record, &AdminContext) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut Record, Value, &AdminContext) -> Result<(), String> + Send + Sync>;

/// Explicit declaration for one meta. Unset fields keep whatever inference
/// (or an earlier declaration) produced.
#[derive(Clone, Default)]
pub struct MetaConfig {
    pub(crate) name: String,
    pub(crate) label: Option<String>,
    pub(crate) kind: Option<MetaKind>,
    pub(crate) column: Option<String>,
    pub(crate) options: Option<OptionSource>,
    pub(crate) permission: Option<Permission>,
    pub(crate) required: Option<bool>,
    pub(crate) readonly: Option<bool>,
    pub(crate) valuer: Option<Valuer>,
    pub(crate) setter: Option<Setter>,
}

impl MetaConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: MetaKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Storage column for a meta that has no reflected field.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Static choices; values double as labels.
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options
            .into_iter()
            .map(|o| {
                let o = o.into();
                SelectOption::new(o.clone(), humanize(&o))
            })
            .collect();
        self.options = Some(OptionSource::Static(options));
        self
    }

    pub fn option_source(mut self, source: OptionSource) -> Self {
        self.options = Some(source);
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    pub fn valuer<F>(mut self, valuer: F) -> Self
    where
        F: Fn(&Record, &AdminContext) -> Value + Send + Sync + 'static,
    {
        self.valuer = Some(Arc::new(valuer));
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut Record, Value, &AdminContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Later declarations win field by field.
    pub(crate) fn merge(&mut self, other: MetaConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(label, kind, column, options, permission, required, readonly, valuer, setter);
    }
}

/// Field descriptor of a resource.
#[derive(Clone)]
pub struct Meta {
    name: String,
    label: String,
    kind: MetaKind,
    explicit_kind: bool,
    field: Option<FieldKind>,
    column: Option<String>,
    options: Option<OptionSource>,
    association: Option<Association>,
    permission: Option<Permission>,
    required: bool,
    readonly: bool,
    valuer: Option<Valuer>,
    setter: Option<Setter>,
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("column", &self.column)
            .field("association", &self.association)
            .finish_non_exhaustive()
    }
}

impl Meta {
    /// Inferred defaults from `field`, overlaid with `declared`.
    ///
    /// Returns `None` when neither side can decide a UI type.
    pub(crate) fn build(field: Option<&FieldDef>, declared: Option<&MetaConfig>) -> Option<Meta> {
        let name = field
            .map(|f| f.name.clone())
            .or_else(|| declared.map(|d| d.name.clone()))?;

        let inferred = field.and_then(|f| MetaKind::infer(&f.kind));
        let explicit = declared.and_then(|d| d.kind);
        let kind = explicit.or(inferred).or_else(|| {
            // A virtual meta with only a valuer is display-only.
            declared
                .filter(|d| d.valuer.is_some() && field.is_none())
                .map(|_| MetaKind::Readonly)
        })?;

        let association = field.and_then(|f| match &f.kind {
            FieldKind::BelongsTo(target) => Some(Association {
                target: *target,
                cardinality: Cardinality::One,
                foreign_key: f.column.clone().unwrap_or_default(),
            }),
            FieldKind::HasMany(target) => Some(Association {
                target: *target,
                cardinality: Cardinality::Many,
                foreign_key: f.foreign_key.clone().unwrap_or_default(),
            }),
            _ => None,
        });

        let inferred_options = field.and_then(|f| match &f.kind {
            FieldKind::Enum(variants) => Some(OptionSource::Static(
                variants
                    .iter()
                    .map(|v| SelectOption::new(v.clone(), humanize(v)))
                    .collect(),
            )),
            FieldKind::BelongsTo(target) | FieldKind::HasMany(target) => {
                Some(OptionSource::Resource(*target))
            }
            _ => None,
        });

        let declared_column = declared.and_then(|d| d.column.clone());
        let column = declared_column.or_else(|| field.and_then(|f| f.column.clone()));

        Some(Meta {
            label: declared
                .and_then(|d| d.label.clone())
                .unwrap_or_else(|| humanize(&name)),
            name,
            kind,
            explicit_kind: explicit.is_some(),
            field: field.map(|f| f.kind.clone()),
            column,
            options: declared.and_then(|d| d.options.clone()).or(inferred_options),
            association,
            permission: declared.and_then(|d| d.permission.clone()),
            required: declared.and_then(|d| d.required).unwrap_or(false),
            readonly: declared.and_then(|d| d.readonly).unwrap_or(kind == MetaKind::Readonly),
            valuer: declared.and_then(|d| d.valuer.clone()),
            setter: declared.and_then(|d| d.setter.clone()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> MetaKind {
        self.kind
    }

    /// Whether the UI type was declared rather than inferred.
    pub fn is_explicit(&self) -> bool {
        self.explicit_kind
    }

    pub fn field_kind(&self) -> Option<&FieldKind> {
        self.field.as_ref()
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn options(&self) -> Option<&OptionSource> {
        self.options.as_ref()
    }

    pub fn association(&self) -> Option<&Association> {
        self.association.as_ref()
    }

    pub fn permission(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_writable(&self) -> bool {
        !self.readonly && (self.column.is_some() || self.setter.is_some())
    }

    pub fn setter(&self) -> Option<&Setter> {
        self.setter.as_ref()
    }

    /// Current value on `record`. Password metas never reveal what is stored.
    pub fn value(&self, record: &Record, ctx: &AdminContext) -> Value {
        if let Some(valuer) = &self.valuer {
            return valuer(record, ctx);
        }
        if self.kind == MetaKind::Password {
            return Value::Null;
        }
        self.column
            .as_ref()
            .and_then(|c| record.get(c))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_kind_beats_inference() {
        let field = FieldDef::new("password", FieldKind::String);
        let declared = MetaConfig::new("password").kind(MetaKind::Password);

        let meta = Meta::build(Some(&field), Some(&declared)).unwrap();
        assert_eq!(meta.kind(), MetaKind::Password);
        assert!(meta.is_explicit());

        let inferred = Meta::build(Some(&field), None).unwrap();
        assert_eq!(inferred.kind(), MetaKind::Text);
    }

    #[test]
    fn opaque_field_needs_declaration() {
        let field = FieldDef::new("payload", FieldKind::Opaque("Json".into()));
        assert!(Meta::build(Some(&field), None).is_none());

        let declared = MetaConfig::new("payload").kind(MetaKind::Textarea);
        assert!(Meta::build(Some(&field), Some(&declared)).is_some());
    }

    #[test]
    fn merge_keeps_earlier_settings() {
        let mut config = MetaConfig::new("state").kind(MetaKind::SelectOne).required(true);
        config.merge(MetaConfig::new("state").label("Order State"));
        assert_eq!(config.kind, Some(MetaKind::SelectOne));
        assert_eq!(config.required, Some(true));
        assert_eq!(config.label.as_deref(), Some("Order State"));
    }

    #[test]
    fn password_value_is_hidden() {
        let field = FieldDef::new("password", FieldKind::String);
        let meta = Meta::build(
            Some(&field),
            Some(&MetaConfig::new("password").kind(MetaKind::Password)),
        )
        .unwrap();
        let record = json!({"password": "$2b$hash"}).as_object().cloned().unwrap();
        assert_eq!(meta.value(&record, &AdminContext::anonymous()), Value::Null);
    }

    #[test]
    fn kind_string_forms() {
        assert_eq!("rich_text".parse::<MetaKind>().unwrap(), MetaKind::RichText);
        assert_eq!(MetaKind::SelectMany.to_string(), "select_many");
        assert!("single_edit".parse::<MetaKind>().is_err());
        assert!("collection_edit".parse::<MetaKind>().is_err());
    }

    #[test]
    fn enum_fields_get_static_options() {
        let field = FieldDef::new("size", FieldKind::Enum(vec!["small".into(), "large".into()]));
        let meta = Meta::build(Some(&field), None).unwrap();
        assert_eq!(meta.kind(), MetaKind::SelectOne);
        match meta.options() {
            Some(OptionSource::Static(options)) => assert_eq!(options.len(), 2),
            other => panic!("unexpected options {:?}", other),
        }
    }
}
