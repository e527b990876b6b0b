use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::ids::FeatureRef;
use foundation::series::ForecastSeries;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::request::FetchTicket;

/// Cached detail value; `None` is a confirmed-empty response.
pub type DetailValue = Option<Arc<ForecastSeries>>;

/// Result of [`DetailCache::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Cached; recency was refreshed.
    Ready(DetailValue),
    /// A fetch for this key is already outstanding; the caller coalesced onto it.
    Pending(FetchTicket),
    /// Nothing cached or in flight; the caller now owns this fetch.
    Fetch(FetchTicket),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored(DetailValue),
    /// Not cached; the next lookup retries.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub key: FeatureRef,
    pub outcome: Outcome,
    /// Keys evicted to make room, oldest first.
    pub evicted: Vec<FeatureRef>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: DetailValue,
    last_used_tick: u64,
}

/// Bounded LRU cache of per-feature forecast detail with in-flight deduplication.
///
/// Notes on determinism:
/// - Entries are keyed in a `BTreeMap` by `FeatureRef`, so the same feature id
///   under two geography levels is two entries.
/// - Recency is an ordered index from access tick to key; a hit moves the key
///   to the newest tick, and eviction always pops the smallest tick.
#[derive(Debug)]
pub struct DetailCache {
    capacity: usize,
    tick: u64,
    next_ticket: u64,
    entries: BTreeMap<FeatureRef, CacheEntry>,
    recency: BTreeMap<u64, FeatureRef>,
    in_flight: BTreeMap<FeatureRef, FetchTicket>,
    tickets: BTreeMap<FetchTicket, FeatureRef>,
}

impl DetailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            next_ticket: 1,
            entries: BTreeMap::new(),
            recency: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            tickets: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &FeatureRef) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_in_flight(&self, key: &FeatureRef) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Reads a cached value without touching recency.
    pub fn peek(&self, key: &FeatureRef) -> Option<&DetailValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn lookup(&mut self, key: &FeatureRef) -> Lookup {
        if self.entries.contains_key(key) {
            self.touch(key);
            let value = self.entries.get(key).and_then(|e| e.value.clone());
            debug!(%key, "detail cache hit");
            return Lookup::Ready(value);
        }

        if let Some(ticket) = self.in_flight.get(key) {
            debug!(%key, ticket = ticket.0, "detail fetch coalesced");
            return Lookup::Pending(*ticket);
        }

        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight.insert(key.clone(), ticket);
        self.tickets.insert(ticket, key.clone());
        debug!(%key, ticket = ticket.0, "detail cache miss");
        Lookup::Fetch(ticket)
    }

    /// Records the result of a fetch started by [`Lookup::Fetch`].
    ///
    /// Returns `None` for unknown or already-completed tickets.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Option<ForecastSeries>, FetchError>,
    ) -> Option<Completed> {
        let key = self.tickets.remove(&ticket)?;
        if self.in_flight.get(&key) == Some(&ticket) {
            self.in_flight.remove(&key);
        }

        let series = match result {
            Ok(series) => series,
            Err(err) => {
                warn!(%key, "detail fetch failed: {err}");
                return Some(Completed {
                    key,
                    outcome: Outcome::Failed,
                    evicted: Vec::new(),
                });
            }
        };

        let value: DetailValue = series.map(Arc::new);
        self.insert(key.clone(), value.clone());
        let evicted = self.evict_as_needed(&key);
        Some(Completed {
            key,
            outcome: Outcome::Stored(value),
            evicted,
        })
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &FeatureRef) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.last_used_tick);
            entry.last_used_tick = tick;
            self.recency.insert(tick, key.clone());
        }
    }

    fn insert(&mut self, key: FeatureRef, value: DetailValue) {
        let tick = self.next_tick();
        if let Some(old) = self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                last_used_tick: tick,
            },
        ) {
            self.recency.remove(&old.last_used_tick);
        }
        self.recency.insert(tick, key);
    }

    fn evict_as_needed(&mut self, protected: &FeatureRef) -> Vec<FeatureRef> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some((&tick, key)) = self.recency.iter().find(|(_, k)| *k != protected) else {
                break;
            };
            let key = key.clone();
            self.recency.remove(&tick);
            self.entries.remove(&key);
            debug!(%key, "detail cache eviction");
            evicted.push(key);
        }
        evicted
    }
}
