//! # Channel data model.
//!
//! - [`ChannelKey`], [`WorkerId`], [`SlotId`] addressing
//! - [`ChannelState`], [`SlotState`], [`ListenerHandle`] the persisted value and its transitions
//! - [`ChannelStore`] typed read/write over a [`SharedStore`](crate::SharedStore)

mod key;
mod state;
mod store;

pub use key::{ChannelKey, DEFAULT_NAMESPACE, DEFAULT_SLOT, SlotId, WorkerId};
pub use state::{ChannelState, Fanout, ListenerHandle, SlotState};
pub use store::ChannelStore;
