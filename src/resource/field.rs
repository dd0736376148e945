//! Registration-time description of a model's fields.
//!
//! A model exposes its fields through [`Describe`]. For `sea-orm` entities
//! [`ModelInfo::from_entity`] reads the column definitions; associations and
//! plain Rust structs are declared with the builder methods.

use std::any::TypeId;
use std::fmt;

use sea_orm::{ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable, PrimaryKeyToColumn};

/// A model type the admin can manage.
pub trait Describe: 'static {
    fn describe() -> ModelInfo;
}

/// Type-erased handle on an associated model, enough to register it later.
#[derive(Clone, Copy)]
pub struct AssocTarget {
    type_id: TypeId,
    type_name: &'static str,
    describe: fn() -> ModelInfo,
}

impl AssocTarget {
    pub fn of<T: Describe>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            describe: T::describe,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn describe(&self) -> ModelInfo {
        (self.describe)()
    }
}

impl fmt::Debug for AssocTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssocTarget").field(&self.type_name).finish()
    }
}

impl PartialEq for AssocTarget {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Text,
    Boolean,
    Integer,
    Float,
    Decimal,
    Date,
    DateTime,
    Time,
    Uuid,
    Enum(Vec<String>),
    BelongsTo(AssocTarget),
    HasMany(AssocTarget),
    /// No sensible default; a meta has to be declared for it.
    Opaque(String),
}

impl FieldKind {
    pub fn association(&self) -> Option<&AssocTarget> {
        match self {
            FieldKind::BelongsTo(target) | FieldKind::HasMany(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Float | FieldKind::Decimal)
    }
}

impl From<&ColumnType> for FieldKind {
    fn from(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::Boolean => FieldKind::Boolean,
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned => FieldKind::Integer,
            ColumnType::Float | ColumnType::Double => FieldKind::Float,
            ColumnType::Decimal(_) | ColumnType::Money(_) => FieldKind::Decimal,
            ColumnType::Date => FieldKind::Date,
            ColumnType::DateTime | ColumnType::Timestamp | ColumnType::TimestampWithTimeZone => {
                FieldKind::DateTime
            }
            ColumnType::Time => FieldKind::Time,
            ColumnType::Text => FieldKind::Text,
            ColumnType::Char(_) | ColumnType::String(_) => FieldKind::String,
            ColumnType::Uuid => FieldKind::Uuid,
            ColumnType::Enum { variants, .. } => {
                FieldKind::Enum(variants.iter().map(|v| v.to_string()).collect())
            }
            other => FieldKind::Opaque(format!("{:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Storage column; `None` for has-many associations.
    pub column: Option<String>,
    /// For has-many associations, the column on the associated table that
    /// points back at this model.
    pub foreign_key: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            column: Some(name.clone()),
            name,
            kind,
            foreign_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub fields: Vec<FieldDef>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: pluralize(&snake_case(&name)),
            name,
            primary_key: "id".to_string(),
            fields: Vec::new(),
        }
    }

    /// Reflects table name, primary key and columns of a `sea-orm` entity.
    pub fn from_entity<E: EntityTrait>() -> Self {
        let entity = E::default();
        let table = entity.table_name().to_string();

        let primary_key = E::PrimaryKey::iter()
            .next()
            .map(|pk| pk.into_column().as_str().to_string())
            .unwrap_or_else(|| "id".to_string());

        let fields = E::Column::iter()
            .map(|column| {
                let def = column.def();
                FieldDef::new(column.as_str(), FieldKind::from(def.get_column_type()))
            })
            .collect();

        Self {
            name: camel_case(&singularize(&table)),
            table,
            primary_key,
            fields,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let field = FieldDef::new(name, kind);
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Declares a belongs-to association stored in `foreign_key`.
    ///
    /// The raw foreign-key column is replaced by the association field, in
    /// the same position.
    pub fn belongs_to<T: Describe>(mut self, name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        let foreign_key = foreign_key.into();
        let field = FieldDef {
            name: name.into(),
            kind: FieldKind::BelongsTo(AssocTarget::of::<T>()),
            column: Some(foreign_key.clone()),
            foreign_key: None,
        };
        match self.fields.iter().position(|f| f.name == foreign_key) {
            Some(index) => self.fields[index] = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Declares a has-many association; `foreign_key` lives on `T`'s table.
    pub fn has_many<T: Describe>(mut self, name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::HasMany(AssocTarget::of::<T>()),
            column: None,
            foreign_key: Some(foreign_key.into()),
        });
        self
    }
}

pub(crate) fn snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

pub(crate) fn camel_case(s: &str) -> String {
    s.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

pub(crate) fn pluralize(s: &str) -> String {
    if s.ends_with('s') {
        s.to_string()
    } else if let Some(stem) = s.strip_suffix('y') {
        format!("{}ies", stem)
    } else {
        format!("{}s", s)
    }
}

pub(crate) fn singularize(s: &str) -> String {
    if let Some(stem) = s.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = s.strip_suffix('s') {
        stem.to_string()
    } else {
        s.to_string()
    }
}

/// "unit_price" -> "Unit Price"
pub(crate) fn humanize(s: &str) -> String {
    s.split(['_', '.'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag;
    impl Describe for Tag {
        fn describe() -> ModelInfo {
            ModelInfo::new("Tag").field("name", FieldKind::String)
        }
    }

    #[test]
    fn naming_helpers() {
        assert_eq!(snake_case("OrderItem"), "order_item");
        assert_eq!(camel_case("order_item"), "OrderItem");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("order"), "orders");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("orders"), "order");
        assert_eq!(humanize("unit_price"), "Unit Price");
        assert_eq!(humanize("category.name"), "Category Name");
    }

    #[test]
    fn belongs_to_replaces_foreign_key_in_place() {
        let info = ModelInfo::new("Post")
            .field("id", FieldKind::Integer)
            .field("tag_id", FieldKind::Integer)
            .field("title", FieldKind::String)
            .belongs_to::<Tag>("tag", "tag_id");

        let names: Vec<_> = info.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "tag", "title"]);
        assert_eq!(info.fields[1].column.as_deref(), Some("tag_id"));
        assert_eq!(info.table, "posts");
    }

    #[test]
    fn column_types_map_to_field_kinds() {
        assert_eq!(FieldKind::from(&ColumnType::Boolean), FieldKind::Boolean);
        assert_eq!(FieldKind::from(&ColumnType::Date), FieldKind::Date);
        assert_eq!(FieldKind::from(&ColumnType::TimestampWithTimeZone), FieldKind::DateTime);
        assert!(matches!(FieldKind::from(&ColumnType::Json), FieldKind::Opaque(_)));
    }
}
