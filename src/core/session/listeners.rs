//! Pub/sub registry for session output channels.
//!
//! Each in-flight command subscribes one listener per channel and removes
//! them on completion. Ids increase monotonically and are never reused, so
//! a stale id held after unsubscribe can never remove someone else's
//! listener.

use std::collections::HashMap;

/// Which of the child's streams a chunk arrived on.
///
/// `Data` is the child's stdout and carries genuine command output.
/// `Control` is the child's stderr, which doubles as the out-of-band
/// completion signal for the command trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Data,
    Control,
}

pub type Listener = Box<dyn FnMut(&str) + Send>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    data: HashMap<u64, Listener>,
    control: HashMap<u64, Listener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, channel: Channel, listener: Listener) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.map_mut(channel).insert(id, listener);
        id
    }

    /// Remove a listener. Unknown or already-removed ids are a no-op.
    pub fn unsubscribe(&mut self, id: u64) {
        self.data.remove(&id);
        self.control.remove(&id);
    }

    /// Drop every listener on both channels.
    pub fn clear(&mut self) {
        self.data.clear();
        self.control.clear();
    }

    /// Deliver a chunk to every current subscriber of `channel`.
    ///
    /// Iterates over a snapshot of the ids present when the chunk arrived,
    /// so listeners removed between chunks are skipped safely.
    pub fn dispatch(&mut self, channel: Channel, chunk: &str) {
        let map = self.map_mut(channel);
        let ids: Vec<u64> = map.keys().copied().collect();
        for id in ids {
            if let Some(listener) = map.get_mut(&id) {
                listener(chunk);
            }
        }
    }

    fn map_mut(&mut self, channel: Channel) -> &mut HashMap<u64, Listener> {
        match channel {
            Channel::Data => &mut self.data,
            Channel::Control => &mut self.control,
        }
    }
}
