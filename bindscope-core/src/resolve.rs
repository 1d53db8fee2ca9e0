//! Alias equivalence with per-search key memoization.
//!
//! An alias is equivalent to the target definition when its id is the
//! target's id, or when its resolved key equals the target's key. Keys are
//! looked up at most once per distinct alias id; failed lookups are cached
//! as unresolved and never retried.

use crate::document::{Alias, ReferenceDefinition};
use crate::error::Diagnostic;
use crate::host::ReferenceStore;
use std::collections::{HashMap, HashSet};

pub struct ReferenceResolver<'s, S: ?Sized> {
    store: &'s S,
    target_key: String,
    /// Alias ids already confirmed equivalent (fast path)
    equivalent: HashSet<String>,
    /// alias id -> resolved key, `None` when resolution failed
    keys: HashMap<String, Option<String>>,
    lookups: usize,
}

impl<'s, S: ReferenceStore + ?Sized> ReferenceResolver<'s, S> {
    pub fn new(store: &'s S, target: &ReferenceDefinition) -> Self {
        let mut equivalent = HashSet::new();
        equivalent.insert(target.id.clone());
        Self {
            store,
            target_key: target.key.clone(),
            equivalent,
            keys: HashMap::new(),
            lookups: 0,
        }
    }

    pub fn is_equivalent(&mut self, alias: &Alias, diagnostics: &mut Vec<Diagnostic>) -> bool {
        if self.equivalent.contains(&alias.id) {
            return true;
        }

        if !self.keys.contains_key(&alias.id) {
            let resolved = self.lookup(&alias.id, diagnostics);
            self.keys.insert(alias.id.clone(), resolved);
        }

        let matched = matches!(
            self.keys.get(&alias.id),
            Some(Some(key)) if *key == self.target_key
        );
        if matched {
            self.equivalent.insert(alias.id.clone());
        }
        matched
    }

    fn lookup(&mut self, alias_id: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<String> {
        self.lookups += 1;
        match self.store.resolve_alias_key(alias_id) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(alias_id, error = %err, "alias key resolution failed");
                diagnostics.push(Diagnostic::Resolution {
                    alias_id: alias_id.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Number of store lookups performed so far
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ResolveError;
    use std::cell::Cell;

    struct CountingStore {
        calls: Cell<usize>,
    }

    impl ReferenceStore for CountingStore {
        fn resolve_alias_key(&self, alias_id: &str) -> Result<String, ResolveError> {
            self.calls.set(self.calls.get() + 1);
            match alias_id {
                "V:copy" => Ok("k-target".to_string()),
                "V:other" => Ok("k-other".to_string()),
                _ => Err(ResolveError::Missing(alias_id.to_string())),
            }
        }

        fn container_exists(&self, _id: &str) -> bool {
            false
        }

        fn definition(&self, _id: &str) -> Option<&ReferenceDefinition> {
            None
        }
    }

    fn target() -> ReferenceDefinition {
        ReferenceDefinition {
            id: "V:target".to_string(),
            name: "color/primary".to_string(),
            key: "k-target".to_string(),
            collection: None,
        }
    }

    fn store() -> CountingStore {
        CountingStore {
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_id_match_needs_no_lookup() {
        let store = store();
        let mut resolver = ReferenceResolver::new(&store, &target());
        let mut diags = Vec::new();
        assert!(resolver.is_equivalent(&Alias::new("V:target"), &mut diags));
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_key_match_resolves_once() {
        let store = store();
        let mut resolver = ReferenceResolver::new(&store, &target());
        let mut diags = Vec::new();
        for _ in 0..5 {
            assert!(resolver.is_equivalent(&Alias::new("V:copy"), &mut diags));
        }
        assert_eq!(store.calls.get(), 1);
        assert_eq!(resolver.lookups(), 1);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_different_key_is_cached_negative() {
        let store = store();
        let mut resolver = ReferenceResolver::new(&store, &target());
        let mut diags = Vec::new();
        assert!(!resolver.is_equivalent(&Alias::new("V:other"), &mut diags));
        assert!(!resolver.is_equivalent(&Alias::new("V:other"), &mut diags));
        assert_eq!(store.calls.get(), 1);
    }

    #[test]
    fn test_failed_resolution_is_not_retried() {
        let store = store();
        let mut resolver = ReferenceResolver::new(&store, &target());
        let mut diags = Vec::new();
        assert!(!resolver.is_equivalent(&Alias::new("V:gone"), &mut diags));
        assert!(!resolver.is_equivalent(&Alias::new("V:gone"), &mut diags));
        assert_eq!(store.calls.get(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind(), "resolution");
    }

    #[test]
    fn test_fresh_resolver_does_not_inherit_cache() {
        let store = store();
        let mut diags = Vec::new();
        {
            let mut first = ReferenceResolver::new(&store, &target());
            assert!(first.is_equivalent(&Alias::new("V:copy"), &mut diags));
        }
        let other_target = ReferenceDefinition {
            key: "k-other".to_string(),
            ..target()
        };
        let mut second = ReferenceResolver::new(&store, &other_target);
        assert!(!second.is_equivalent(&Alias::new("V:copy"), &mut diags));
        assert!(second.is_equivalent(&Alias::new("V:other"), &mut diags));
        assert_eq!(store.calls.get(), 3);
    }
}
