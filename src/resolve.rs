//! Ordered transitive closures of the types needed by features and extensions.
//!
//! The order of a closure mirrors the C header: every type appears after the types it embeds,
//! and otherwise in the order it was first referenced.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

use crate::config::Options;
use crate::diag::Diagnostics;
use crate::error::ResolveError;
use crate::types::*;

/// What to do with references to names the registry does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Fail with [`ResolveError::Unresolved`].
    Strict,
    /// Log, record in the closure's diagnostics and carry on.
    Lenient,
}

impl Default for ResolveMode {
    fn default() -> Self {
        ResolveMode::Lenient
    }
}

/// Ordered, deduplicated set of type names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    pub types: IndexSet<String>,
    pub diagnostics: Diagnostics,
}

impl Closure {
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Removes every name in `other`, keeping the relative order of the rest.
    pub fn subtract(&mut self, other: &IndexSet<String>) {
        self.types.retain(|name| !other.contains(name));
    }

    /// Appends the names of `other` not present yet. Diagnostics are left alone.
    pub fn union(&mut self, other: &Closure) {
        for name in &other.types {
            if !self.types.contains(name) {
                self.types.insert(name.clone());
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
pub struct Resolver<'r> {
    registry: &'r Registry,
    mode: ResolveMode,
}

#[derive(Default)]
struct Walk {
    closed: IndexSet<String>,
    in_progress: HashSet<String>,
    diagnostics: Diagnostics,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry, mode: ResolveMode) -> Self {
        Resolver { registry, mode }
    }

    /// Top level names referenced by `requires`, deduplicated in first-seen order, each with
    /// the name of whatever referenced it first.
    ///
    /// Within a block, types come first, then the enumerations extended by enum references,
    /// then the return and parameter types of each command.
    pub fn references<'a, I>(
        &self,
        unit: &str,
        requires: I,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<String, String>
    where
        I: IntoIterator<Item = &'a Require>,
    {
        let mut references = IndexMap::new();
        let mut add = |name: &str, referrer: &str| {
            if !references.contains_key(name) {
                references.insert(String::from(name), String::from(referrer));
            }
        };

        for require in requires {
            for name in &require.types {
                add(name.as_str(), unit);
            }
            for e in &require.enums {
                if let Some(ref extends) = e.extends {
                    add(extends.as_str(), e.name.as_str());
                }
            }
            for name in &require.commands {
                match self.registry.command(name) {
                    Some(command) => {
                        add(command.return_type(), name.as_str());
                        for param in &command.params {
                            add(param.type_name.as_str(), name.as_str());
                        }
                    }
                    None => {
                        tracing::warn!(command = %name, referrer = %unit, "undefined command");
                        diagnostics.unresolved(name, unit);
                    }
                }
            }
        }
        references
    }

    /// Computes the closure of everything `requires` references.
    ///
    /// `unit` names the feature or extension and appears in diagnostics.
    pub fn closure<'a, I>(&self, unit: &str, requires: I) -> Result<Closure, ResolveError>
    where
        I: IntoIterator<Item = &'a Require>,
    {
        let mut walk = Walk::default();
        let references = self.references(unit, requires, &mut walk.diagnostics);
        for (name, referrer) in &references {
            self.expand(name, referrer, &mut walk);
        }

        if self.mode == ResolveMode::Strict && !walk.diagnostics.unresolved_references().is_empty() {
            return Err(ResolveError::Unresolved(walk.diagnostics.into_unresolved()));
        }

        Ok(Closure {
            types: walk.closed,
            diagnostics: walk.diagnostics,
        })
    }

    fn expand(&self, name: &str, referrer: &str, walk: &mut Walk) {
        if walk.closed.contains(name)
            || walk.in_progress.contains(name)
            || self.registry.elided.contains(name)
        {
            return;
        }

        let ty = match self.registry.type_named(name) {
            Some(ty) => ty,
            None => {
                tracing::warn!(name = %name, referrer = %referrer, "undefined type skipped");
                walk.diagnostics.unresolved(name, referrer);
                return;
            }
        };

        match ty.kind {
            TypeKind::Struct(ref aggregate) | TypeKind::Union(ref aggregate) => {
                walk.in_progress.insert(String::from(name));
                for member in &aggregate.members {
                    self.expand(&member.type_name, name, walk);
                }
                walk.in_progress.remove(name);
                walk.closed.insert(String::from(name));
            }
            TypeKind::FunctionPointer {
                ref ret,
                ref params,
            } => {
                walk.in_progress.insert(String::from(name));
                self.expand(&ret.type_name, name, walk);
                walk.in_progress.remove(name);
                walk.closed.insert(String::from(name));
                for param in params {
                    self.expand(&param.type_name, name, walk);
                }
            }
            TypeKind::Alias { ref target } => {
                walk.in_progress.insert(String::from(name));
                self.expand(target, name, walk);
                walk.in_progress.remove(name);
                walk.closed.insert(String::from(name));
            }
            TypeKind::Ignored
            | TypeKind::SystemAlias { .. }
            | TypeKind::BaseAlias { .. }
            | TypeKind::PlatformOpaque { .. }
            | TypeKind::Bitmask { .. }
            | TypeKind::Handle { .. }
            | TypeKind::EnumTag => {
                walk.closed.insert(String::from(name));
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Feature,
    Extension,
}

/// One feature or extension together with the types it owns.
#[derive(Debug, Clone)]
pub struct Unit<'r> {
    pub name: &'r str,
    pub kind: UnitKind,
    /// Extension number, the default base for extension-relative enum values.
    pub number: Option<i64>,
    pub requires: Vec<&'r Require>,
    pub closure: Closure,
}

/// Every feature and supported extension with partitioned closures.
///
/// A feature owns the types its closure adds over the features before it. An extension owns
/// what its closure adds over all features, so core and extension bundles never overlap.
#[derive(Debug, Clone)]
pub struct Plan<'r> {
    pub features: Vec<Unit<'r>>,
    pub extensions: Vec<Unit<'r>>,
    pub core_types: Closure,
    pub extension_types: Closure,
}

impl<'r> Plan<'r> {
    pub fn new(registry: &'r Registry, options: &Options) -> Result<Self, ResolveError> {
        let resolver = Resolver::new(registry, options.mode);

        let mut core_types = Closure::default();
        let mut features = Vec::new();
        for feature in &registry.features {
            let mut closure = resolver.closure(&feature.name, &feature.requires)?;
            closure.subtract(&core_types.types);
            core_types.union(&closure);
            tracing::debug!(feature = %feature.name, types = closure.len(), "feature resolved");
            features.push(Unit {
                name: &feature.name,
                kind: UnitKind::Feature,
                number: None,
                requires: feature.requires.iter().collect(),
                closure,
            });
        }

        let mut extension_types = Closure::default();
        let mut extensions = Vec::new();
        for extension in &registry.extensions {
            if !extension.supported.is_supported(&options.api) {
                tracing::trace!(extension = %extension.name, "not supported, skipped");
                continue;
            }
            let mut closure = resolver.closure(&extension.name, Some(&extension.require))?;
            closure.subtract(&core_types.types);
            extension_types.union(&closure);
            tracing::debug!(extension = %extension.name, types = closure.len(), "extension resolved");
            extensions.push(Unit {
                name: &extension.name,
                kind: UnitKind::Extension,
                number: extension.number,
                requires: vec![&extension.require],
                closure,
            });
        }

        Ok(Plan {
            features,
            extensions,
            core_types,
            extension_types,
        })
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit<'r>> {
        self.features.iter().chain(self.extensions.iter())
    }

    /// Diagnostics of every unit, merged.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for unit in self.units() {
            diagnostics.merge(unit.closure.diagnostics.clone());
        }
        diagnostics
    }
}
