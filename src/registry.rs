//! Table of registered resources, keyed by model type.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AdminError, AdminResult};
use crate::resource::{declared_names, project, AssocTarget, Describe, Meta, Resource, View};

/// One association step of a dotted path.
#[derive(Clone, Copy)]
pub struct Hop<'a> {
    pub from: &'a Resource,
    pub meta: &'a Meta,
    pub to: &'a Resource,
}

/// Where a (possibly dotted) attribute path ends up.
pub struct ResolvedPath<'a> {
    pub owner: &'a Resource,
    pub meta: &'a Meta,
    pub via: Vec<Hop<'a>>,
}

/// Registration happens on a mutable `Registry` at startup; [`finish`]
/// validates it and hands back a shared, read-only value.
///
/// [`finish`]: Registry::finish
#[derive(Default)]
pub struct Registry {
    resources: Vec<Resource>,
    index: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, or returns the existing resource for it.
    ///
    /// Association targets of `T` are registered along the way.
    pub fn register<T: Describe>(&mut self) -> &mut Resource {
        let position = self.ensure(AssocTarget::of::<T>());
        &mut self.resources[position]
    }

    fn ensure(&mut self, target: AssocTarget) -> usize {
        if let Some(&position) = self.index.get(&target.type_id()) {
            return position;
        }

        let resource = Resource::from_info(target.type_id(), target.describe());
        info!("📋 Registered resource {} ({})", resource.name(), resource.table());

        let position = self.resources.len();
        let associated: Vec<AssocTarget> = resource
            .fields()
            .iter()
            .filter_map(|f| f.kind.association().copied())
            .collect();
        self.resources.push(resource);
        self.index.insert(target.type_id(), position);

        for target in associated {
            self.ensure(target);
        }
        position
    }

    pub fn lookup<T: Describe>(&self) -> AdminResult<&Resource> {
        self.index
            .get(&TypeId::of::<T>())
            .map(|&position| &self.resources[position])
            .ok_or_else(|| AdminError::NotRegistered(std::any::type_name::<T>().to_string()))
    }

    pub fn lookup_type(&self, type_id: TypeId) -> AdminResult<&Resource> {
        self.index
            .get(&type_id)
            .map(|&position| &self.resources[position])
            .ok_or_else(|| AdminError::NotRegistered(format!("{:?}", type_id)))
    }

    /// Resource behind an association or argument target.
    pub fn target(&self, target: &AssocTarget) -> AdminResult<&Resource> {
        self.lookup_type(target.type_id())
            .map_err(|_| AdminError::NotRegistered(target.type_name().to_string()))
    }

    pub fn resource_mut<T: Describe>(&mut self) -> AdminResult<&mut Resource> {
        match self.index.get(&TypeId::of::<T>()) {
            Some(&position) => Ok(&mut self.resources[position]),
            None => Err(AdminError::NotRegistered(std::any::type_name::<T>().to_string())),
        }
    }

    /// Resource addressed by a URL segment.
    pub fn by_param(&self, param: &str) -> AdminResult<&Resource> {
        self.resources
            .iter()
            .find(|r| r.param() == param)
            .ok_or_else(|| AdminError::UnknownResource(param.to_string()))
    }

    /// In registration order.
    pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Resolves `name` or `assoc.name` (any depth) starting at `resource`.
    pub fn resolve_path<'a>(&'a self, resource: &'a Resource, path: &str) -> Option<ResolvedPath<'a>> {
        let mut owner = resource;
        let mut via = Vec::new();
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let meta = owner.meta_named(segment)?;
            if segments.peek().is_none() {
                return Some(ResolvedPath { owner, meta, via });
            }
            let association = meta.association()?;
            let to = self.target(&association.target).ok()?;
            via.push(Hop { from: owner, meta, to });
            owner = to;
        }
        None
    }

    /// Completes registration and freezes the registry.
    ///
    /// Registers action argument types, then checks every resource's metas,
    /// projections, search paths, orderings and URL parameters. Any problem
    /// is returned and the registry is dropped.
    pub fn finish(mut self) -> AdminResult<Arc<Registry>> {
        let arguments: Vec<AssocTarget> = self
            .resources
            .iter()
            .flat_map(|r| r.actions().iter().filter_map(|a| a.argument_target().copied()))
            .collect();
        for target in arguments {
            if !self.index.contains_key(&target.type_id()) {
                let position = self.ensure(target);
                // Argument types are forms, not things to browse.
                self.resources[position].invisible();
            }
        }

        let mut params = HashSet::new();
        for resource in &self.resources {
            if !params.insert(resource.param()) {
                return Err(AdminError::DuplicateResource(resource.param().to_string()));
            }
            self.check(resource)?;
        }

        info!("✅ Admin registry ready with {} resources", self.resources.len());
        Ok(Arc::new(self))
    }

    fn check(&self, resource: &Resource) -> AdminResult<()> {
        resource.check_metas()?;

        for view in View::ALL {
            if let Some(attrs) = resource.attrs_for(view) {
                debug!("Checking {} {} attrs: {:?}", resource.name(), view, declared_names(attrs));
            }
            let projected = project(self, resource, view)?;
            debug!("{} {} view projects {} entries", resource.name(), view, projected.len());
        }

        for path in resource.search_paths() {
            if self.resolve_path(resource, path).is_none() {
                return Err(AdminError::unknown_attribute(resource.name(), path, "search attrs"));
            }
        }

        for (name, _) in resource.ordering() {
            if resource.meta_named(name).and_then(Meta::column).is_none() {
                return Err(AdminError::unknown_attribute(resource.name(), name, "default order"));
            }
        }

        if let Some(name) = resource.declared_title() {
            if resource.meta_named(name).is_none() {
                return Err(AdminError::unknown_attribute(resource.name(), name, "title field"));
            }
        }

        for meta in resource.metas() {
            if let Some(association) = meta.association() {
                self.target(&association.target)?;
            }
        }

        Ok(())
    }
}
