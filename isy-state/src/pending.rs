//! Events that arrived before their target was known
//!
//! The hub can report a node before the store has seen it in a snapshot.
//! Such events wait here, bounded per target and by age, and are replayed
//! after the next snapshot.

use chrono::{DateTime, Utc};
use isy_parser::{HubEvent, VariableType};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::HubId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PendingKey {
    Node(String),
    Variable(VariableType, u32),
    Program(String),
}

#[derive(Debug)]
pub(crate) struct PendingBuffer {
    per_key: usize,
    ttl: Duration,
    entries: HashMap<(HubId, PendingKey), VecDeque<HubEvent>>,
    dropped: u64,
    expired: u64,
}

impl PendingBuffer {
    pub fn new(per_key: usize, ttl: Duration) -> Self {
        Self {
            per_key: per_key.max(1),
            ttl,
            entries: HashMap::new(),
            dropped: 0,
            expired: 0,
        }
    }

    /// Hold an event. The oldest held event for the same target makes room.
    pub fn push(&mut self, hub: &HubId, key: PendingKey, event: HubEvent) {
        debug!(hub = %hub, target = ?key, "Holding event for unknown target");
        let queue = self.entries.entry((hub.clone(), key)).or_default();
        if queue.len() >= self.per_key {
            queue.pop_front();
            self.dropped += 1;
            warn!(
                hub = %hub,
                dropped_total = self.dropped,
                "Pending buffer full for target; dropped oldest held event"
            );
        }
        queue.push_back(event);
    }

    /// Remove and return everything held for `hub`, oldest first per target
    pub fn take_hub(&mut self, hub: &HubId) -> Vec<HubEvent> {
        let keys: Vec<(HubId, PendingKey)> = self
            .entries
            .keys()
            .filter(|(h, _)| h == hub)
            .cloned()
            .collect();
        let mut events: Vec<HubEvent> = keys
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .flatten()
            .collect();
        events.sort_by_key(|e| e.received_at);
        events
    }

    /// Discard events older than the ttl. Returns how many were discarded.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let mut count = 0;
        self.entries.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|event| !is_older_than(event.received_at, now, ttl));
            count += before - queue.len();
            !queue.is_empty()
        });
        if count > 0 {
            self.expired += count as u64;
            warn!(
                discarded = count,
                expired_total = self.expired,
                "Discarded events whose target never appeared"
            );
        }
        count
    }

    pub fn clear_hub(&mut self, hub: &HubId) {
        self.entries.retain(|(h, _), _| h != hub);
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped + self.expired
    }
}

fn is_older_than(at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    (now - at).to_std().map(|age| age > ttl).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isy_parser::{ControlEvent, EventKind};

    fn control(address: &str, at: DateTime<Utc>) -> HubEvent {
        let mut event = HubEvent::new(EventKind::Control(ControlEvent {
            address: address.to_string(),
            control: "DON".to_string(),
            value: None,
        }));
        event.received_at = at;
        event
    }

    #[test]
    fn test_oldest_dropped_per_target() {
        let hub = HubId::new("hub");
        let mut buffer = PendingBuffer::new(2, Duration::from_secs(30));
        let now = Utc::now();
        for offset in 0..3 {
            let at = now + chrono::Duration::seconds(offset);
            buffer.push(&hub, PendingKey::Node("A".into()), control("A", at));
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);

        let events = buffer.take_hub(&hub);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].received_at, now + chrono::Duration::seconds(1));
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_expire_by_age() {
        let hub = HubId::new("hub");
        let mut buffer = PendingBuffer::new(8, Duration::from_secs(30));
        let now = Utc::now();
        buffer.push(&hub, PendingKey::Node("A".into()), control("A", now - chrono::Duration::seconds(60)));
        buffer.push(&hub, PendingKey::Node("B".into()), control("B", now));

        assert_eq!(buffer.expire(now), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_take_is_per_hub() {
        let mut buffer = PendingBuffer::new(8, Duration::from_secs(30));
        let now = Utc::now();
        buffer.push(&HubId::new("a"), PendingKey::Node("1".into()), control("1", now));
        buffer.push(&HubId::new("b"), PendingKey::Node("1".into()), control("1", now));

        assert_eq!(buffer.take_hub(&HubId::new("a")).len(), 1);
        assert_eq!(buffer.len(), 1);
        buffer.clear_hub(&HubId::new("b"));
        assert_eq!(buffer.len(), 0);
    }
}
