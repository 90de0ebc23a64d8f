//! Diagnostics collected during resolution and emission.
//!
//! Nothing here is global: each call that can produce diagnostics takes or returns a
//! [`Diagnostics`] value, and the driver merges them at the end of a run.

use std::collections::BTreeSet;

use crate::error::UnresolvedReference;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    unresolved: Vec<UnresolvedReference>,
    substitutions: BTreeSet<&'static str>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dangling reference. Repeats of the same pair are ignored.
    pub fn unresolved(&mut self, name: &str, referrer: &str) {
        let exists = self
            .unresolved
            .iter()
            .any(|u| u.name == name && u.referrer == referrer);
        if !exists {
            self.unresolved.push(UnresolvedReference {
                name: String::from(name),
                referrer: String::from(referrer),
            });
        }
    }

    pub fn unresolved_references(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    pub fn into_unresolved(self) -> Vec<UnresolvedReference> {
        self.unresolved
    }

    /// Marks a substitution table entry as used.
    pub fn substitution_used(&mut self, key: &'static str) {
        self.substitutions.insert(key);
    }

    pub fn used_substitutions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.substitutions.iter().copied()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        for u in other.unresolved {
            self.unresolved(&u.name, &u.referrer);
        }
        self.substitutions.extend(other.substitutions);
    }

    pub fn is_empty(&self) -> bool {
        self.unresolved.is_empty() && self.substitutions.is_empty()
    }
}
