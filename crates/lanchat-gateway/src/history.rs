use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use lanchat_types::models::HistoryEntry;

use crate::namespace::Namespace;

/// Fixed-capacity FIFO of recent messages for one namespace.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push `entry`, evicting the oldest entries beyond capacity.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Entries oldest-first. With a retention window, only entries newer
    /// than `now - retention` are returned; a zero window returns all.
    pub fn snapshot(&self, now: i64, retention: Option<Duration>) -> Vec<HistoryEntry> {
        match retention.filter(|r| !r.is_zero()) {
            Some(retention) => {
                let cutoff = cutoff(now, retention);
                self.entries
                    .iter()
                    .filter(|entry| entry.timestamp > cutoff)
                    .cloned()
                    .collect()
            }
            None => self.entries.iter().cloned().collect(),
        }
    }

    /// Drop entries at or older than `now - retention`. Returns how many went.
    pub fn prune(&mut self, now: i64, retention: Duration) -> usize {
        if retention.is_zero() {
            return 0;
        }
        let cutoff = cutoff(now, retention);
        let before = self.entries.len();
        self.entries.retain(|entry| entry.timestamp > cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cutoff(now: i64, retention: Duration) -> i64 {
    let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
    now.saturating_sub(retention_ms)
}

/// One ring for the public lobby plus one per private room. Rings never
/// share storage, so a room's history cannot leak into another.
#[derive(Debug)]
pub struct HistoryStore {
    public: HistoryRing,
    rooms: HashMap<String, HistoryRing>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            public: HistoryRing::new(capacity),
            rooms: HashMap::new(),
            capacity,
        }
    }

    pub fn ring(&self, namespace: &Namespace) -> Option<&HistoryRing> {
        match namespace {
            Namespace::Public => Some(&self.public),
            Namespace::Private(room_id) => self.rooms.get(room_id),
        }
    }

    pub fn ring_mut(&mut self, namespace: &Namespace) -> &mut HistoryRing {
        match namespace {
            Namespace::Public => &mut self.public,
            Namespace::Private(room_id) => {
                let capacity = self.capacity;
                self.rooms
                    .entry(room_id.clone())
                    .or_insert_with(|| HistoryRing::new(capacity))
            }
        }
    }

    pub fn snapshot(&self, namespace: &Namespace, now: i64, retention: Option<Duration>) -> Vec<HistoryEntry> {
        self.ring(namespace)
            .map(|ring| ring.snapshot(now, retention))
            .unwrap_or_default()
    }
}
