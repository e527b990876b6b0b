/// Engine counters.
///
/// A fixed enum instead of string keys keeps snapshots stably ordered and
/// makes typos a compile error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Counter {
    CacheHit,
    CacheMiss,
    FetchCoalesced,
    FetchFailed,
    CacheEviction,
    StaleDetailDiscarded,
    SwapStaged,
    SwapCommitted,
    SwapSuperseded,
    SwapTimeoutFallback,
}

impl Counter {
    pub const ALL: [Counter; 10] = [
        Counter::CacheHit,
        Counter::CacheMiss,
        Counter::FetchCoalesced,
        Counter::FetchFailed,
        Counter::CacheEviction,
        Counter::StaleDetailDiscarded,
        Counter::SwapStaged,
        Counter::SwapCommitted,
        Counter::SwapSuperseded,
        Counter::SwapTimeoutFallback,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Counter::CacheHit => "cache.hit",
            Counter::CacheMiss => "cache.miss",
            Counter::FetchCoalesced => "cache.coalesced",
            Counter::FetchFailed => "cache.fetch_failed",
            Counter::CacheEviction => "cache.eviction",
            Counter::StaleDetailDiscarded => "detail.stale_discarded",
            Counter::SwapStaged => "swap.staged",
            Counter::SwapCommitted => "swap.committed",
            Counter::SwapSuperseded => "swap.superseded",
            Counter::SwapTimeoutFallback => "swap.timeout_fallback",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counts: [u64; Counter::ALL.len()],
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&mut self, c: Counter) {
        self.add(c, 1);
    }

    pub fn add(&mut self, c: Counter, by: u64) {
        let slot = &mut self.counts[c as usize];
        *slot = slot.saturating_add(by);
    }

    pub fn get(&self, c: Counter) -> u64 {
        self.counts[c as usize]
    }

    /// Non-zero counters in declaration order, suitable for logs.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        Counter::ALL
            .into_iter()
            .filter(|c| self.get(*c) > 0)
            .map(|c| (c.name(), self.get(c)))
            .collect()
    }
}
