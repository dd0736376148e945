//! Per-view attribute lists and their projection onto Metas.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::auth::{allowed, AdminContext, Target, Verb};
use crate::error::{AdminError, AdminResult};
use crate::registry::{Hop, Registry};
use crate::resource::{FieldKind, Meta, MetaKind, Resource};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum View {
    Index,
    New,
    Edit,
    Show,
}

impl View {
    pub const ALL: [View; 4] = [View::Index, View::New, View::Edit, View::Show];

    /// Verb the caller needs on a field to get it in this view.
    pub fn verb(self) -> Verb {
        match self {
            View::Index | View::Show => Verb::Read,
            View::New => Verb::Create,
            View::Edit => Verb::Update,
        }
    }

    /// View whose declaration is used when this one has none.
    fn fallback(self) -> Option<View> {
        match self {
            View::Show | View::New => Some(View::Edit),
            View::Index | View::Edit => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrEntry {
    Field(String),
    Section {
        title: String,
        rows: Vec<Vec<String>>,
    },
}

/// Declared attribute list for one view.
///
/// A name starting with `-` excludes it. A list made only of exclusions
/// means "the defaults except these".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs {
    entries: Vec<AttrEntry>,
    excluded: Vec<String>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(Self::new(), |attrs, name| attrs.field(name))
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match name.strip_prefix('-') {
            Some(excluded) => self.excluded.push(excluded.to_string()),
            None => self.entries.push(AttrEntry::Field(name)),
        }
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// A titled group of rows, each row holding one or more fields.
    pub fn section<R, I, S>(mut self, title: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.entries.push(AttrEntry::Section {
            title: title.into(),
            rows,
        });
        self
    }

    pub fn entries(&self) -> &[AttrEntry] {
        &self.entries
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn is_exclusion_only(&self) -> bool {
        self.entries.is_empty()
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().flat_map(|entry| match entry {
            AttrEntry::Field(name) => vec![name.as_str()],
            AttrEntry::Section { rows, .. } => {
                rows.iter().flatten().map(String::as_str).collect()
            }
        })
    }
}

impl<const N: usize> From<[&str; N]> for Attrs {
    fn from(names: [&str; N]) -> Self {
        Attrs::from_names(names)
    }
}

impl From<Vec<&str>> for Attrs {
    fn from(names: Vec<&str>) -> Self {
        Attrs::from_names(names)
    }
}

/// A resolved attribute: the Meta it ends on, plus the association hops
/// walked for dotted paths.
#[derive(Clone)]
pub struct ProjectedField<'a> {
    pub path: String,
    pub owner: &'a Resource,
    pub meta: &'a Meta,
    pub via: Vec<Hop<'a>>,
}

impl ProjectedField<'_> {
    pub fn is_nested(&self) -> bool {
        !self.via.is_empty()
    }

    pub fn label(&self) -> String {
        if self.is_nested() {
            let mut parts: Vec<&str> = self.via.iter().map(|hop| hop.meta.label()).collect();
            parts.push(self.meta.label());
            parts.join(" ")
        } else {
            self.meta.label().to_string()
        }
    }
}

#[derive(Clone)]
pub enum Projected<'a> {
    Field(ProjectedField<'a>),
    Section {
        title: String,
        rows: Vec<Vec<ProjectedField<'a>>>,
    },
}

/// All fields of a projection in display order, sections flattened.
pub fn flatten<'a, 'b>(projected: &'b [Projected<'a>]) -> Vec<&'b ProjectedField<'a>> {
    projected
        .iter()
        .flat_map(|entry| match entry {
            Projected::Field(field) => vec![field],
            Projected::Section { rows, .. } => rows.iter().flatten().collect(),
        })
        .collect()
}

fn default_names(resource: &Resource, view: View) -> Vec<&str> {
    let metas = resource.metas().iter();
    match view {
        View::Index => metas
            .filter(|m| {
                !matches!(
                    m.kind(),
                    MetaKind::Password | MetaKind::Textarea | MetaKind::RichText
                )
            })
            .filter(|m| !matches!(m.field_kind(), Some(FieldKind::HasMany(_))))
            .map(Meta::name)
            .collect(),
        View::New | View::Edit | View::Show => metas
            .filter(|m| m.is_writable())
            .filter(|m| m.column() != Some(resource.primary_key()))
            .map(Meta::name)
            .collect(),
    }
}

fn resolve<'a>(
    registry: &'a Registry,
    resource: &'a Resource,
    view: View,
    path: &str,
) -> AdminResult<ProjectedField<'a>> {
    let resolved = registry
        .resolve_path(resource, path)
        .ok_or_else(|| AdminError::unknown_attribute(resource.name(), path, format!("{} attrs", view)))?;
    Ok(ProjectedField {
        path: path.to_string(),
        owner: resolved.owner,
        meta: resolved.meta,
        via: resolved.via,
    })
}

/// Ordered field list for `view`.
///
/// Show and new fall back to the edit declaration; without any declaration
/// the defaults apply. Unknown names fail with `UnknownAttribute`.
pub fn project<'a>(
    registry: &'a Registry,
    resource: &'a Resource,
    view: View,
) -> AdminResult<Vec<Projected<'a>>> {
    let declared = resource
        .attrs_for(view)
        .or_else(|| view.fallback().and_then(|v| resource.attrs_for(v)));

    let excluded: &[String] = declared.map(Attrs::excluded).unwrap_or(&[]);
    for name in excluded {
        if resource.meta_named(name).is_none() {
            return Err(AdminError::unknown_attribute(
                resource.name(),
                name,
                format!("{} exclusions", view),
            ));
        }
    }
    let kept = |name: &str| !excluded.iter().any(|e| e == name);

    let mut projected = Vec::new();
    match declared.filter(|attrs| !attrs.is_exclusion_only()) {
        Some(attrs) => {
            for entry in attrs.entries() {
                match entry {
                    AttrEntry::Field(name) if kept(name.as_str()) => {
                        projected.push(Projected::Field(resolve(registry, resource, view, name)?));
                    }
                    AttrEntry::Field(_) => {}
                    AttrEntry::Section { title, rows } => {
                        let mut resolved_rows = Vec::new();
                        for row in rows {
                            let mut fields = Vec::new();
                            for name in row.iter().filter(|n| kept(n.as_str())) {
                                fields.push(resolve(registry, resource, view, name)?);
                            }
                            if !fields.is_empty() {
                                resolved_rows.push(fields);
                            }
                        }
                        projected.push(Projected::Section {
                            title: title.clone(),
                            rows: resolved_rows,
                        });
                    }
                }
            }
        }
        None => {
            let defaults_for = if view == View::Index { View::Index } else { View::Edit };
            for name in default_names(resource, defaults_for) {
                if kept(name) {
                    projected.push(Projected::Field(resolve(registry, resource, view, name)?));
                }
            }
        }
    }
    Ok(projected)
}

/// [`project`], minus the fields the request's roles may not see in `view`.
pub fn project_allowed<'a>(
    registry: &'a Registry,
    resource: &'a Resource,
    view: View,
    ctx: &AdminContext,
) -> AdminResult<Vec<Projected<'a>>> {
    let visible = |field: &ProjectedField<'_>| {
        // Nested values are only ever displayed.
        let verb = if field.is_nested() { Verb::Read } else { view.verb() };
        field
            .via
            .iter()
            .all(|hop| allowed(&ctx.roles, Verb::Read, Target::Meta(hop.from, hop.meta)))
            && allowed(&ctx.roles, verb, Target::Meta(field.owner, field.meta))
    };

    Ok(project(registry, resource, view)?
        .into_iter()
        .filter_map(|entry| match entry {
            Projected::Field(field) => visible(&field).then_some(Projected::Field(field)),
            Projected::Section { title, rows } => {
                let rows: Vec<_> = rows
                    .into_iter()
                    .map(|row| row.into_iter().filter(|f| visible(f)).collect::<Vec<_>>())
                    .filter(|row| !row.is_empty())
                    .collect();
                (!rows.is_empty()).then_some(Projected::Section { title, rows })
            }
        })
        .collect())
}

/// Every name a declaration references, for configuration checks.
pub(crate) fn declared_names(attrs: &Attrs) -> Vec<&str> {
    attrs.names().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_prefix_means_exclusion() {
        let attrs = Attrs::from(["-password", "-notes"]);
        assert!(attrs.is_exclusion_only());
        assert_eq!(attrs.excluded(), ["password".to_string(), "notes".to_string()]);
    }

    #[test]
    fn sections_keep_row_layout() {
        let attrs = Attrs::new()
            .field("name")
            .section("Pricing", [vec!["price", "currency"], vec!["discount"]]);
        assert_eq!(
            declared_names(&attrs),
            vec!["name", "price", "currency", "discount"]
        );
    }

    #[test]
    fn view_verbs() {
        assert_eq!(View::Index.verb(), Verb::Read);
        assert_eq!(View::New.verb(), Verb::Create);
        assert_eq!(View::Edit.verb(), Verb::Update);
        assert_eq!("show".parse::<View>().unwrap(), View::Show);
    }
}
