//! Tile cache keyed by tile address
//!
//! Each address gets exactly one entry and at most one load. Failures are
//! remembered permanently so a broken tile is never fetched twice.

use std::collections::HashMap;
use std::sync::Arc;

use super::projection::TileAddress;

/// Something that can start loading a tile in the background.
///
/// The result comes back later through [`TileCache::complete`].
pub trait TileFetcher {
    fn fetch(&mut self, address: TileAddress);
}

/// Stored state of one address
enum TileEntry<T> {
    Pending,
    Loaded(Arc<T>),
    Failed,
}

/// What a lookup found
#[derive(Debug)]
pub enum TileState<'a, T> {
    Pending,
    Loaded(&'a Arc<T>),
    Failed,
}

impl<T> TileState<'_, T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, TileState::Loaded(_))
    }
}

/// Cache of loaded tile resources.
///
/// Unbounded unless a capacity is given, in which case the least recently
/// used loaded tiles are evicted. Pending and failed entries are never
/// evicted.
pub struct TileCache<T> {
    entries: HashMap<TileAddress, TileEntry<T>>,
    access_order: Vec<TileAddress>,
    capacity: Option<usize>,
    loads_issued: usize,
}

impl<T> TileCache<T> {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: Vec::new(),
            capacity,
            loads_issued: 0,
        }
    }

    /// Look up a tile, issuing a load through `fetcher` on first request
    pub fn request<F: TileFetcher + ?Sized>(
        &mut self,
        address: TileAddress,
        fetcher: &mut F,
    ) -> TileState<'_, T> {
        if !self.entries.contains_key(&address) {
            self.entries.insert(address, TileEntry::Pending);
            self.loads_issued += 1;
            fetcher.fetch(address);
            return TileState::Pending;
        }

        self.update_access_order(address);
        self.state(&address)
    }

    /// Look up a tile without issuing a load or touching LRU order
    pub fn peek(&self, address: &TileAddress) -> Option<&Arc<T>> {
        match self.entries.get(address) {
            Some(TileEntry::Loaded(tile)) => Some(tile),
            _ => None,
        }
    }

    fn state(&self, address: &TileAddress) -> TileState<'_, T> {
        match self.entries.get(address) {
            Some(TileEntry::Loaded(tile)) => TileState::Loaded(tile),
            Some(TileEntry::Failed) => TileState::Failed,
            Some(TileEntry::Pending) | None => TileState::Pending,
        }
    }

    /// Record the outcome of a load started by [`request`](Self::request)
    pub fn complete(&mut self, address: TileAddress, result: Result<T, String>) {
        if !matches!(self.entries.get(&address), Some(TileEntry::Pending)) {
            log::debug!("Ignoring completion for tile {} that is not pending", address);
            return;
        }

        match result {
            Ok(tile) => {
                while self.should_evict() {
                    if !self.evict_oldest() {
                        break;
                    }
                }
                log::debug!("Loaded tile {}", address);
                self.entries.insert(address, TileEntry::Loaded(Arc::new(tile)));
                self.access_order.push(address);
            }
            Err(e) => {
                log::warn!("Failed to load tile {}: {}", address, e);
                self.entries.insert(address, TileEntry::Failed);
            }
        }
    }

    fn should_evict(&self) -> bool {
        match self.capacity {
            Some(capacity) => !self.access_order.is_empty() && self.access_order.len() >= capacity,
            None => false,
        }
    }

    /// Evict the least recently used loaded tile
    fn evict_oldest(&mut self) -> bool {
        if self.access_order.is_empty() {
            return false;
        }
        let oldest = self.access_order.remove(0);
        self.entries.remove(&oldest);
        log::debug!("Evicted tile {}", oldest);
        true
    }

    fn update_access_order(&mut self, address: TileAddress) {
        if let Some(pos) = self.access_order.iter().position(|a| a == &address) {
            self.access_order.remove(pos);
            self.access_order.push(address);
        }
    }

    /// Total loads ever issued through this cache
    pub fn loads_issued(&self) -> usize {
        self.loads_issued
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            capacity: self.capacity,
            ..CacheStats::default()
        };
        for entry in self.entries.values() {
            match entry {
                TileEntry::Pending => stats.pending += 1,
                TileEntry::Loaded(_) => stats.loaded += 1,
                TileEntry::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

impl<T> Default for TileCache<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Cache statistics for the status bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub loaded: usize,
    pub pending: usize,
    pub failed: usize,
    pub capacity: Option<usize>,
}
