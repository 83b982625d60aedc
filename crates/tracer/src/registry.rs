//! Registry of timing records keyed by function identity.

use std::collections::{HashMap, HashSet};

use crate::identity::{FunctionId, Target, WrapperId};
use crate::record::{Mechanism, TimingRecord};

/// Outcome of an enable/disable request against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    /// First reference to the identity; a new enabled record was created
    Created(Mechanism),
    /// An existing record was enabled
    Enabled,
    /// An existing record was disabled
    Disabled,
    /// Disable requested for an identity never seen before; nothing to do
    Unknown,
}

/// Timing records in first-reference order, plus the bookkeeping both
/// instrumentation mechanisms rely on.
///
/// Records are never removed. The watch set always holds exactly the enabled
/// identities whose mechanism is [`Mechanism::Watched`].
#[derive(Debug, Default)]
pub(crate) struct Registry {
    order: Vec<FunctionId>,
    records: HashMap<FunctionId, TimingRecord>,
    wrappers: HashMap<WrapperId, FunctionId>,
    pub(crate) watched: HashSet<FunctionId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Return the record for `id`, creating it for `mechanism` if absent.
    pub(crate) fn ensure(&mut self, id: FunctionId, mechanism: Mechanism) -> &mut TimingRecord {
        if !self.records.contains_key(&id) {
            self.order.push(id);
            if mechanism == Mechanism::Watched {
                self.watched.insert(id);
            }
        }
        self.records
            .entry(id)
            .or_insert_with(|| TimingRecord::new(mechanism))
    }

    /// Update the enabled state of `id`.
    ///
    /// A new identity is only created when enabling; it joins the path given
    /// by `mechanism`. Existing records keep the mechanism they were created
    /// with. `summ_recursive` is applied on enable only.
    pub(crate) fn set_enabled(
        &mut self,
        id: FunctionId,
        enabled: bool,
        summ_recursive: bool,
        mechanism: Mechanism,
    ) -> Change {
        let Some(record) = self.records.get_mut(&id) else {
            if !enabled {
                return Change::Unknown;
            }
            self.ensure(id, mechanism).enable(summ_recursive);
            return Change::Created(mechanism);
        };

        if enabled {
            record.enable(summ_recursive);
        } else {
            record.disable();
        }

        if record.mechanism() == Mechanism::Watched {
            if enabled {
                self.watched.insert(id);
            } else {
                self.watched.remove(&id);
            }
        }

        if enabled {
            Change::Enabled
        } else {
            Change::Disabled
        }
    }

    pub(crate) fn get(&self, id: &FunctionId) -> Option<&TimingRecord> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &FunctionId) -> Option<&mut TimingRecord> {
        self.records.get_mut(id)
    }

    pub(crate) fn contains(&self, id: &FunctionId) -> bool {
        self.records.contains_key(id)
    }

    /// Remember which function a wrapper stands for.
    pub(crate) fn register_wrapper(&mut self, wrapper: WrapperId, id: FunctionId) {
        self.wrappers.insert(wrapper, id);
    }

    /// Resolve a toggle target to the identity keying its record.
    ///
    /// Returns `None` for a wrapper this registry never produced.
    pub(crate) fn resolve(&self, target: Target) -> Option<FunctionId> {
        match target {
            Target::Function(id) => Some(id),
            Target::Wrapper(wrapper) => self.wrappers.get(&wrapper).copied(),
        }
    }

    /// Whether the interception hook must act on `id`.
    #[inline]
    pub(crate) fn is_watched(&self, id: &FunctionId) -> bool {
        self.watched.contains(id)
    }

    /// Whether no function needs the interception hook.
    #[inline]
    pub(crate) fn watch_set_is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Watched identities in registration order.
    pub(crate) fn watched(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|id| self.watched.contains(id))
    }

    /// All identities in registration order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.order.iter().copied()
    }

    /// All records in registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (FunctionId, &TimingRecord)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).map(|record| (*id, record)))
    }

    /// Clear runs and pending start times on every record.
    pub(crate) fn reset_all(&mut self) {
        for record in self.records.values_mut() {
            record.reset();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_id;

    const A: FunctionId = function_id!("a");
    const B: FunctionId = function_id!("b");
    const C: FunctionId = function_id!("c");

    #[test]
    fn test_ensure_preserves_insertion_order() {
        let mut registry = Registry::new();
        registry.ensure(C, Mechanism::Wrapped);
        registry.ensure(A, Mechanism::Wrapped);
        registry.ensure(B, Mechanism::Wrapped);
        registry.ensure(A, Mechanism::Wrapped);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![C, A, B]);
    }

    #[test]
    fn test_ensure_keeps_first_mechanism() {
        let mut registry = Registry::new();
        registry.ensure(A, Mechanism::Wrapped);
        let record = registry.ensure(A, Mechanism::Watched);

        assert_eq!(record.mechanism(), Mechanism::Wrapped);
        assert!(!registry.is_watched(&A));
    }

    #[test]
    fn test_set_enabled_tracks_watch_set() {
        let mut registry = Registry::new();
        assert!(registry.watch_set_is_empty());

        assert_eq!(
            registry.set_enabled(A, true, false, Mechanism::Watched),
            Change::Created(Mechanism::Watched)
        );
        assert!(registry.is_watched(&A));

        assert_eq!(
            registry.set_enabled(A, false, false, Mechanism::Watched),
            Change::Disabled
        );
        assert!(!registry.is_watched(&A));
        assert!(registry.watch_set_is_empty());
        assert!(registry.contains(&A));

        assert_eq!(
            registry.set_enabled(A, true, true, Mechanism::Watched),
            Change::Enabled
        );
        assert!(registry.is_watched(&A));
        assert!(registry.get(&A).unwrap().summ_recursive());
    }

    #[test]
    fn test_wrapped_records_never_join_watch_set() {
        let mut registry = Registry::new();
        registry.ensure(A, Mechanism::Wrapped);

        registry.set_enabled(A, false, false, Mechanism::Watched);
        registry.set_enabled(A, true, false, Mechanism::Watched);

        assert!(registry.get(&A).unwrap().is_enabled());
        assert!(registry.watch_set_is_empty());
    }

    #[test]
    fn test_disable_unknown_is_noop() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.set_enabled(A, false, false, Mechanism::Watched),
            Change::Unknown
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_targets() {
        let mut registry = Registry::new();
        let wrapper = WrapperId::next();
        let stranger = WrapperId::next();
        registry.ensure(B, Mechanism::Wrapped);
        registry.register_wrapper(wrapper, B);

        assert_eq!(registry.resolve(Target::Function(A)), Some(A));
        assert_eq!(registry.resolve(Target::Wrapper(wrapper)), Some(B));
        assert_eq!(registry.resolve(Target::Wrapper(stranger)), None);
    }

    #[test]
    fn test_watched_in_registration_order() {
        let mut registry = Registry::new();
        registry.set_enabled(B, true, false, Mechanism::Watched);
        registry.set_enabled(C, true, false, Mechanism::Wrapped);
        registry.set_enabled(A, true, false, Mechanism::Watched);

        assert_eq!(registry.watched().collect::<Vec<_>>(), vec![B, A]);
    }

    #[test]
    fn test_reset_all() {
        let mut registry = Registry::new();
        registry.ensure(A, Mechanism::Wrapped).begin();
        registry.get_mut(&A).unwrap().end();
        registry.ensure(B, Mechanism::Watched).begin();

        registry.reset_all();

        for (_, record) in registry.iter() {
            assert!(record.runs().is_empty());
            assert_eq!(record.depth(), 0);
        }
    }
}
