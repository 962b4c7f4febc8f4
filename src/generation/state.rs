//! Run state and reconciliation of outcomes into it.
//!
//! `RunState` holds one entry per descriptor in descriptor order. Entries are
//! reference counted: reconciling an outcome swaps exactly one `Arc` and shares
//! every other entry with the previous state, so observers can compare entries
//! with `Arc::ptr_eq` to find what changed.

use crate::generation::descriptor::ItemDescriptor;
use crate::generation::outcome::{GenerationOutcome, ItemPayload};
use crate::types::{ItemId, RunId};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemEntry {
    pub id: ItemId,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ItemPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ItemEntry {
    fn pending(id: ItemId) -> Self {
        Self {
            id,
            status: ItemStatus::Pending,
            payload: None,
            failure: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == ItemStatus::Pending
    }
}

#[derive(Debug, Clone)]
pub struct RunState {
    run_id: RunId,
    entries: Vec<Arc<ItemEntry>>,
    index: HashMap<ItemId, usize>,
}

/// Per-status totals of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl RunState {
    /// State with no items, used before the first run and after a reset.
    pub fn empty(run_id: RunId) -> Self {
        Self {
            run_id,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Every descriptor Pending, in descriptor order. Duplicate ids keep the
    /// first occurrence; callers reject duplicates before this point.
    pub fn pending(run_id: RunId, descriptors: &[ItemDescriptor]) -> Self {
        let mut entries = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if index.contains_key(&descriptor.id) {
                continue;
            }
            index.insert(descriptor.id, entries.len());
            entries.push(Arc::new(ItemEntry::pending(descriptor.id)));
        }
        Self {
            run_id,
            entries,
            index,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn entries(&self) -> &[Arc<ItemEntry>] {
        &self.entries
    }

    pub fn get(&self, id: ItemId) -> Option<&Arc<ItemEntry>> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.entries {
            match entry.status {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::Loaded => counts.loaded += 1,
                ItemStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// True once no entry is Pending.
    pub fn is_settled(&self) -> bool {
        self.entries.iter().all(|e| !e.is_loading())
    }

    /// Apply one outcome. Returns `None` when the outcome changes nothing: the id
    /// is unknown, or its entry already left Pending.
    pub fn apply(&self, outcome: &GenerationOutcome) -> Option<RunState> {
        let position = *self.index.get(&outcome.id())?;
        if !self.entries[position].is_loading() {
            return None;
        }
        let settled = match outcome {
            GenerationOutcome::Success { id, payload } => ItemEntry {
                id: *id,
                status: ItemStatus::Loaded,
                payload: Some(payload.clone()),
                failure: None,
            },
            GenerationOutcome::Failure { id, reason } => ItemEntry {
                id: *id,
                status: ItemStatus::Failed,
                payload: None,
                failure: Some(reason.clone()),
            },
        };
        let mut entries = self.entries.clone();
        entries[position] = Arc::new(settled);
        Some(RunState {
            run_id: self.run_id,
            entries,
            index: self.index.clone(),
        })
    }
}

/// Merge an outcome into a state, leaving it unchanged when the outcome does not apply.
pub fn reconcile(state: &RunState, outcome: &GenerationOutcome) -> RunState {
    state.apply(outcome).unwrap_or_else(|| state.clone())
}

impl PartialEq for RunState {
    fn eq(&self, other: &Self) -> bool {
        self.run_id == other.run_id
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| a.as_ref() == b.as_ref())
    }
}

impl Serialize for RunState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let items: Vec<&ItemEntry> = self.entries.iter().map(Arc::as_ref).collect();
        let mut s = serializer.serialize_struct("RunState", 3)?;
        s.serialize_field("run_id", &self.run_id)?;
        s.serialize_field("counts", &self.counts())?;
        s.serialize_field("items", &items)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::DataUri;
    use proptest::prelude::*;
    use serde_json::Map;

    fn descriptors(n: u32) -> Vec<ItemDescriptor> {
        (1..=n).map(|i| ItemDescriptor::new(i, Map::new())).collect()
    }

    fn success(id: u32) -> GenerationOutcome {
        GenerationOutcome::Success {
            id: ItemId(id),
            payload: ItemPayload::image(DataUri::from_bytes("image/png", &[id as u8])),
        }
    }

    fn failure(id: u32) -> GenerationOutcome {
        GenerationOutcome::Failure {
            id: ItemId(id),
            reason: format!("item {} failed", id),
        }
    }

    #[test]
    fn pending_state_preserves_descriptor_order() {
        let mut d = descriptors(3);
        d.reverse();
        let state = RunState::pending(RunId(1), &d);
        let ids: Vec<u32> = state.entries().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(state.counts().pending, 3);
        assert!(!state.is_settled());
    }

    #[test]
    fn reconcile_replaces_only_matching_entry() {
        let state = RunState::pending(RunId(1), &descriptors(4));
        let next = reconcile(&state, &failure(2));
        for (before, after) in state.entries().iter().zip(next.entries()) {
            if before.id == ItemId(2) {
                assert!(!Arc::ptr_eq(before, after));
                assert_eq!(after.status, ItemStatus::Failed);
                assert!(after.payload.is_none());
                assert_eq!(after.failure.as_deref(), Some("item 2 failed"));
            } else {
                assert!(Arc::ptr_eq(before, after));
            }
        }
    }

    #[test]
    fn settled_entries_do_not_transition_again() {
        let state = RunState::pending(RunId(1), &descriptors(2));
        let loaded = reconcile(&state, &success(1));
        assert!(loaded.apply(&failure(1)).is_none());
        assert_eq!(loaded.get(ItemId(1)).unwrap().status, ItemStatus::Loaded);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let state = RunState::pending(RunId(1), &descriptors(2));
        assert!(state.apply(&success(9)).is_none());
        assert_eq!(reconcile(&state, &success(9)), state);
    }

    #[test]
    fn serializes_counts_and_items() {
        let state = reconcile(&RunState::pending(RunId(4), &descriptors(2)), &failure(1));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["run_id"], 4);
        assert_eq!(value["counts"]["failed"], 1);
        assert_eq!(value["items"][0]["status"], "failed");
        assert_eq!(value["items"][1]["status"], "pending");
    }

    proptest! {
        #[test]
        fn reconciliation_is_order_independent(
            order in Just((1u32..=12).collect::<Vec<_>>()).prop_shuffle(),
            failing in proptest::collection::hash_set(1u32..=12, 0..6),
        ) {
            let initial = RunState::pending(RunId(7), &descriptors(12));
            let outcome_for = |id: u32| if failing.contains(&id) { failure(id) } else { success(id) };

            let in_order = (1..=12).fold(initial.clone(), |s, id| reconcile(&s, &outcome_for(id)));
            let shuffled = order.iter().fold(initial, |s, &id| reconcile(&s, &outcome_for(id)));

            prop_assert_eq!(&in_order, &shuffled);
            prop_assert!(shuffled.is_settled());
            prop_assert_eq!(shuffled.len(), 12);
            prop_assert_eq!(shuffled.counts().failed, failing.len());
        }
    }
}
