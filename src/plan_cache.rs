//! Plan Cache: backend-lifetime memoization of prepared cascade statements.
//!
//! Keyed by `trigger_name $ relation_oid`, so one deployed trigger owns at
//! most one plan per relation it fires on. Entries are created unset, filled
//! exactly once, and never evicted. The cache is backend-local state: a
//! backend handles one transaction stream at a time, which is what makes the
//! unsynchronized `RefCell` sound. Entries are not invalidated when the
//! destination relation's schema changes; `pg_cascade_touch_plans()` exists
//! so that cached identities can at least be inspected.

use std::cell::RefCell;
use std::rc::Rc;

use pgrx::pg_sys;
use pgrx::spi::OwnedPreparedStatement;
use serde::Serialize;

use crate::config;

/// One `(trigger, relation)` pair and its prepared statement, if built yet
pub struct PlanEntry {
    ident: String,
    plan: Option<Rc<OwnedPreparedStatement>>,
}

impl PlanEntry {
    fn new(ident: &str) -> Self {
        PlanEntry { ident: ident.to_string(), plan: None }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn plan(&self) -> Option<Rc<OwnedPreparedStatement>> {
        self.plan.clone()
    }

    /// Populate a freshly built statement. An entry is filled at most once
    /// per backend; after that it is only ever read.
    pub fn fill(&mut self, statement: OwnedPreparedStatement) -> Rc<OwnedPreparedStatement> {
        debug_assert!(self.plan.is_none(), "plan entry {} filled twice", self.ident);
        let plan = Rc::new(statement);
        self.plan = Some(Rc::clone(&plan));
        plan
    }
}

/// Owned, growable collection of cached plans
///
/// Lookup is a linear scan: the population is one or two entries per deployed
/// trigger, so anything fancier would not pay for itself.
pub struct PlanCache {
    entries: Vec<PlanEntry>,
}

impl PlanCache {
    pub const fn new() -> Self {
        PlanCache { entries: Vec::new() }
    }

    /// Find the entry for `ident`, appending an unset one on a miss.
    ///
    /// The entry is returned before it is filled so the executor can build
    /// and store the statement in the same pass.
    pub fn lookup_or_create(&mut self, ident: &str) -> &mut PlanEntry {
        let position = match self.entries.iter().position(|entry| entry.ident == ident) {
            Some(position) => position,
            None => {
                self.entries.push(PlanEntry::new(ident));
                self.entries.len() - 1
            }
        };
        &mut self.entries[position]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            entries: self.entries.len(),
            planned: self.entries.iter().filter(|entry| entry.plan.is_some()).count(),
            idents: self.entries.iter().map(|entry| entry.ident.clone()).collect(),
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the cache for the `pg_cascade_touch_plans()` introspection
/// function
#[derive(Debug, Clone, Serialize)]
pub struct PlanCacheStats {
    pub entries: usize,
    pub planned: usize,
    pub idents: Vec<String>,
}

thread_local! {
    /// Backend-local plan cache, alive until the backend exits
    static PLAN_CACHE: RefCell<PlanCache> = const { RefCell::new(PlanCache::new()) };
}

/// Run `f` with exclusive access to the backend's plan cache.
///
/// The borrow must end before the cascade statement executes: the executed
/// UPDATE can itself fire cascade triggers, which re-enter here.
pub fn with<R>(f: impl FnOnce(&mut PlanCache) -> R) -> R {
    PLAN_CACHE.with(|cache| f(&mut cache.borrow_mut()))
}

/// Snapshot the backend's cache for introspection.
pub fn stats() -> PlanCacheStats {
    PLAN_CACHE.with(|cache| cache.borrow().stats())
}

/// Build the identity key for a `(trigger, relation)` pair.
pub fn plan_ident(trigger_name: &str, relation_id: pg_sys::Oid) -> String {
    format!("{}{}{}", trigger_name, config::PLAN_IDENT_SEPARATOR, relation_id.as_u32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_creates_entry_once() {
        let mut cache = PlanCache::new();

        let entry = cache.lookup_or_create("post_touch$16384");
        assert_eq!(entry.ident(), "post_touch$16384");
        assert!(entry.plan().is_none());
        assert_eq!(cache.len(), 1);

        cache.lookup_or_create("post_touch$16384");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_pairs_get_distinct_entries() {
        let mut cache = PlanCache::new();

        cache.lookup_or_create("post_touch$16384");
        cache.lookup_or_create("post_touch$16402");
        cache.lookup_or_create("comment_touch$16384");

        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_stats_report_unfilled_entries() {
        let mut cache = PlanCache::new();
        cache.lookup_or_create("post_touch$16384");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.planned, 0);
        assert_eq!(stats.idents, vec!["post_touch$16384".to_string()]);
    }

    #[test]
    fn test_ident_separator() {
        let ident = plan_ident("post_touch", pg_sys::InvalidOid);
        assert_eq!(ident, "post_touch$0");
    }
}
