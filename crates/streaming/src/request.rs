/// Identifies one outstanding detail fetch.
///
/// Small and copyable so it can travel through host channels and back into
/// [`crate::cache::DetailCache::complete`] without borrowing the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(pub u64);
