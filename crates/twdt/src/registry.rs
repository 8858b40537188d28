//! Ordered collection of watched entities and their check-in flags.

use crate::entity::Identity;
use crate::error::{TwdtError, TwdtResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A watched entity.
#[derive(Debug, Clone)]
pub struct Entry {
    name: Arc<str>,
    has_reset: bool,
}

impl Entry {
    /// Name used in timeout reports.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the entity checked in during the current period.
    #[must_use]
    pub const fn has_reset(&self) -> bool {
        self.has_reset
    }
}

/// Entities subscribed to the watchdog.
///
/// Each identity appears at most once. A new entry starts out as already
/// checked in, so subscribing never makes the current period fail by itself.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: BTreeMap<Identity, Entry>,
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entity.
    #[must_use]
    pub fn find(&self, id: Identity) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// Whether `id` is subscribed.
    #[must_use]
    pub fn contains(&self, id: Identity) -> bool {
        self.entries.contains_key(&id)
    }

    /// Subscribe `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `id` is already subscribed; the registry
    /// is left unchanged.
    pub fn insert(&mut self, id: Identity, name: impl Into<Arc<str>>) -> TwdtResult<()> {
        if self.entries.contains_key(&id) {
            return Err(TwdtError::invalid_argument(format!(
                "{id} is already subscribed"
            )));
        }
        self.entries.insert(
            id,
            Entry {
                name: name.into(),
                has_reset: true,
            },
        );
        Ok(())
    }

    /// Unsubscribe `id`, returning its entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `id` is not subscribed.
    pub fn remove(&mut self, id: Identity) -> TwdtResult<Entry> {
        self.entries
            .remove(&id)
            .ok_or_else(|| TwdtError::invalid_argument(format!("{id} is not subscribed")))
    }

    /// Record a check-in from `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not subscribed.
    pub fn mark_reset(&mut self, id: Identity) -> TwdtResult<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| TwdtError::not_found(format!("{id} is not subscribed")))?;
        entry.has_reset = true;
        Ok(())
    }

    /// Whether every entity checked in. True for an empty registry.
    #[must_use]
    pub fn all_reset(&self) -> bool {
        self.entries.values().all(|entry| entry.has_reset)
    }

    /// Start a new period: every entity owes a check-in again.
    pub fn clear_reset_flags(&mut self) {
        for entry in self.entries.values_mut() {
            entry.has_reset = false;
        }
    }

    /// Entities that have not checked in, in report order.
    pub fn delinquent(&self) -> impl Iterator<Item = (Identity, &Entry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.has_reset)
            .map(|(id, entry)| (*id, entry))
    }

    /// All entities in report order.
    pub fn iter(&self) -> impl Iterator<Item = (Identity, &Entry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Number of subscribed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
