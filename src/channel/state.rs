//! # Channel state: per-slot queues and listener handles.
//!
//! A [`ChannelState`] is the value stored under one [`ChannelKey`](crate::ChannelKey).
//! It maps [`SlotId`]s to [`SlotState`]s and is persisted as a JSON object:
//!
//! ```text
//! {
//!   "--default--": { "queue": ["A", "B"] },               // no listener yet
//!   "1":           { "listener": {..}, "queue": ["C"] },   // worker 1, attached
//!   "2":           { "queue": [] }                         // worker 2, detached
//! }
//! ```
//!
//! ## Rules
//! - The default bucket never holds a listener handle.
//! - Queues are FIFO; [`ChannelState::pop`] removes the head.
//! - The methods here are pure state transitions; atomicity is provided by the caller
//!   running them inside one locked read-modify-write.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::{SlotId, WorkerId};

/// Per-process sequence for listener handles.
static HANDLE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of a registered polling task.
///
/// Unique across processes sharing a store: it carries the OS process id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerHandle {
    pid: u32,
    id: u64,
}

impl ListenerHandle {
    /// Allocates a fresh handle for this process.
    pub fn next() -> Self {
        Self {
            pid: std::process::id(),
            id: HANDLE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    /// Process id that allocated the handle.
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pid, self.id)
    }
}

/// Queue and listener state of one slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotState {
    /// Present iff a listener is attached to the slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener: Option<ListenerHandle>,
    /// Messages awaiting delivery, oldest first.
    #[serde(default)]
    pub queue: VecDeque<Value>,
}

/// Result of fanning a message out over a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fanout {
    /// Number of worker slots the message was appended to.
    pub enqueued: usize,
    /// Whether the message was appended to the default bucket.
    pub buffered: bool,
}

impl Fanout {
    /// True when nobody received the message.
    pub fn dropped(&self) -> bool {
        self.enqueued == 0 && !self.buffered
    }
}

/// Mapping of slot → [`SlotState`] stored under a channel key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelState {
    slots: BTreeMap<SlotId, SlotState>,
}

impl ChannelState {
    /// Creates an empty channel state.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the channel has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots (default bucket included).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the slot state for `slot`.
    pub fn slot(&self, slot: &SlotId) -> Option<&SlotState> {
        self.slots.get(slot)
    }

    /// Returns the slot state of `worker`.
    pub fn worker(&self, worker: &WorkerId) -> Option<&SlotState> {
        SlotId::worker(worker).ok().and_then(|id| self.slots.get(&id))
    }

    /// Returns the default bucket, if present.
    pub fn default_bucket(&self) -> Option<&SlotState> {
        self.slots.get(&SlotId::default_bucket())
    }

    /// Iterates slots in key order.
    pub fn slots(&self) -> impl Iterator<Item = (&SlotId, &SlotState)> {
        self.slots.iter()
    }

    /// Appends `message` to every eligible slot.
    ///
    /// - No slots: buffered in the default bucket when `store` is set, dropped otherwise.
    /// - Otherwise: appended to each slot that has a listener, or to every slot when `store` is set.
    pub fn publish(&mut self, message: Value, store: bool) -> Fanout {
        let mut fanout = Fanout::default();

        if self.slots.is_empty() {
            if store {
                self.slots
                    .entry(SlotId::default_bucket())
                    .or_default()
                    .queue
                    .push_back(message);
                fanout.buffered = true;
            }
            return fanout;
        }

        for (id, slot) in self.slots.iter_mut() {
            if !store && slot.listener.is_none() {
                continue;
            }
            slot.queue.push_back(message.clone());
            if id.is_default() {
                fanout.buffered = true;
            } else {
                fanout.enqueued += 1;
            }
        }
        fanout
    }

    /// Attaches `handle` to `slot`, creating the slot if needed, and migrates the default bucket.
    ///
    /// Buffered default messages are prepended (in their original order) to every worker slot,
    /// then the default bucket is deleted. Returns the number of migrated messages.
    pub fn attach(&mut self, slot: &SlotId, handle: ListenerHandle) -> usize {
        debug_assert!(!slot.is_default());
        self.slots.entry(slot.clone()).or_default().listener = Some(handle);

        let Some(bucket) = self.slots.remove(&SlotId::default_bucket()) else {
            return 0;
        };
        let migrated = bucket.queue.len();
        if migrated == 0 {
            return 0;
        }
        for state in self.slots.values_mut() {
            let mut queue = bucket.queue.clone();
            queue.append(&mut state.queue);
            state.queue = queue;
        }
        migrated
    }

    /// Detaches the listener of `slot`.
    ///
    /// With `purge` the slot is deleted along with its unread messages; otherwise only the
    /// handle is cleared (when it is still `handle`) and the queue is kept for the next listener.
    /// Returns the number of messages left behind or purged.
    pub fn detach(&mut self, slot: &SlotId, handle: &ListenerHandle, purge: bool) -> usize {
        if purge {
            return self.slots.remove(slot).map_or(0, |s| s.queue.len());
        }
        match self.slots.get_mut(slot) {
            Some(state) => {
                if state.listener.as_ref() == Some(handle) {
                    state.listener = None;
                }
                state.queue.len()
            }
            None => 0,
        }
    }

    /// Removes and returns the head of `slot`'s queue.
    pub fn pop(&mut self, slot: &SlotId) -> Option<Value> {
        self.slots.get_mut(slot)?.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn worker(n: u64) -> SlotId {
        SlotId::worker(&WorkerId::from(n)).unwrap()
    }

    fn queue(state: &ChannelState, slot: &SlotId) -> Vec<Value> {
        state.slot(slot).unwrap().queue.iter().cloned().collect()
    }

    #[test]
    fn publish_to_empty_channel_buffers_in_default() {
        let mut state = ChannelState::new();
        let fanout = state.publish(json!("A"), true);
        assert!(fanout.buffered);
        assert_eq!(fanout.enqueued, 0);
        assert_eq!(queue(&state, &SlotId::default_bucket()), vec![json!("A")]);
    }

    #[test]
    fn publish_without_store_to_empty_channel_drops() {
        let mut state = ChannelState::new();
        assert!(state.publish(json!("A"), false).dropped());
        assert!(state.is_empty());
    }

    #[test]
    fn publish_without_store_skips_detached_slots() {
        let mut state = ChannelState::new();
        state.attach(&worker(1), ListenerHandle::next());
        state.attach(&worker(2), ListenerHandle::next());
        let h2 = state.slot(&worker(2)).unwrap().listener.unwrap();
        state.detach(&worker(2), &h2, false);

        let fanout = state.publish(json!("x"), false);
        assert_eq!(fanout.enqueued, 1);
        assert_eq!(queue(&state, &worker(1)), vec![json!("x")]);
        assert!(queue(&state, &worker(2)).is_empty());

        let fanout = state.publish(json!("y"), true);
        assert_eq!(fanout.enqueued, 2);
        assert_eq!(queue(&state, &worker(2)), vec![json!("y")]);
    }

    #[test]
    fn attach_migrates_default_ahead_of_existing_messages() {
        let mut state = ChannelState::new();
        state.publish(json!(1), true);
        state.publish(json!(2), true);

        let migrated = state.attach(&worker(1), ListenerHandle::next());
        assert_eq!(migrated, 2);
        assert!(state.default_bucket().is_none());
        assert_eq!(queue(&state, &worker(1)), vec![json!(1), json!(2)]);
    }

    #[test]
    fn detach_with_purge_removes_slot() {
        let mut state = ChannelState::new();
        let h = ListenerHandle::next();
        state.attach(&worker(3), h);
        state.publish(json!("lost"), true);

        assert_eq!(state.detach(&worker(3), &h, true), 1);
        assert!(state.slot(&worker(3)).is_none());
    }

    #[test]
    fn detach_keeps_foreign_handle() {
        let mut state = ChannelState::new();
        let mine = ListenerHandle::next();
        let theirs = ListenerHandle::next();
        state.attach(&worker(1), theirs);

        state.detach(&worker(1), &mine, false);
        assert_eq!(state.slot(&worker(1)).unwrap().listener, Some(theirs));
    }

    #[test]
    fn pop_is_fifo_and_empty_pop_is_none() {
        let mut state = ChannelState::new();
        state.attach(&worker(1), ListenerHandle::next());
        state.publish(json!("a"), true);
        state.publish(json!("b"), true);

        assert_eq!(state.pop(&worker(1)), Some(json!("a")));
        assert_eq!(state.pop(&worker(1)), Some(json!("b")));
        assert_eq!(state.pop(&worker(1)), None);
        assert_eq!(state.pop(&worker(9)), None);
    }

    #[test]
    fn persisted_form_is_a_plain_object() {
        let mut state = ChannelState::new();
        state.publish(json!("A"), true);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value, json!({ "--default--": { "queue": ["A"] } }));

        let back: ChannelState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
