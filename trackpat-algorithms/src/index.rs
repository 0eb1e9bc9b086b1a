//! Per-layer index of the hits still available for clustering.
//!
//! Buckets are kept sorted by z so window queries come out in a stable
//! order. A claimed hit is only reserved: releasing it puts it back at its
//! sorted position.

use trackpat_core::{Detector, HitArena, HitId};

/// Layer-bucketed availability index (one bucket per pad row).
#[derive(Debug, Clone, Default)]
pub struct HitIndex {
    layers: Vec<Vec<HitId>>,
    /// Sort key (z) and layer per hit; `None` for hits the index never held.
    slots: Vec<Option<(f64, u32)>>,
    available: Vec<bool>,
    n_available: usize,
}

impl HitIndex {
    /// Indexes every main-tracker hit of `arena` whose layer is below `n_layers`.
    #[must_use]
    pub fn new(arena: &HitArena, n_layers: u32) -> Self {
        let mut layers = vec![Vec::new(); n_layers as usize];
        let mut slots = vec![None; arena.len()];
        let mut available = vec![false; arena.len()];
        let mut n_available = 0;

        for id in arena.ids_of(Detector::Main) {
            let hit = arena.get(id);
            if hit.layer >= n_layers {
                continue;
            }
            layers[hit.layer as usize].push(id);
            slots[id.index()] = Some((hit.position.z, hit.layer));
            available[id.index()] = true;
            n_available += 1;
        }

        let mut index = Self {
            layers,
            slots,
            available,
            n_available,
        };
        for l in 0..index.layers.len() {
            let mut bucket = std::mem::take(&mut index.layers[l]);
            bucket.sort_by(|a, b| index.compare(*a, *b));
            index.layers[l] = bucket;
        }
        index
    }

    fn key(&self, id: HitId) -> f64 {
        self.slots[id.index()].map_or(0.0, |(z, _)| z)
    }

    fn compare(&self, a: HitId, b: HitId) -> std::cmp::Ordering {
        self.key(a).total_cmp(&self.key(b)).then(a.cmp(&b))
    }

    /// Number of layers.
    #[must_use]
    pub fn n_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    /// Number of hits currently available.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_available
    }

    /// Returns true if no hit is available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_available == 0
    }

    /// Available hits of one layer, sorted by z.
    #[must_use]
    pub fn layer(&self, layer: u32) -> &[HitId] {
        self.layers.get(layer as usize).map_or(&[], Vec::as_slice)
    }

    /// Available hits of the inclusive layer range `lo..=hi`, inner layers first.
    #[must_use]
    pub fn hits_in_range(&self, lo: u32, hi: u32) -> Vec<HitId> {
        let hi = hi.min(self.n_layers().saturating_sub(1));
        (lo..=hi)
            .flat_map(|l| self.layer(l).iter().copied())
            .collect()
    }

    /// Whether `id` is indexed and not claimed.
    #[must_use]
    pub fn is_available(&self, id: HitId) -> bool {
        self.available.get(id.index()).copied().unwrap_or(false)
    }

    /// Removes `id` from its bucket. Returns false if it was not available.
    pub fn claim(&mut self, id: HitId) -> bool {
        if !self.is_available(id) {
            return false;
        }
        let Some((_, layer)) = self.slots[id.index()] else {
            return false;
        };
        let found = self.layers[layer as usize].binary_search_by(|probe| self.compare(*probe, id));
        if let Ok(pos) = found {
            self.layers[layer as usize].remove(pos);
        }
        self.available[id.index()] = false;
        self.n_available -= 1;
        true
    }

    /// Puts a claimed hit back. Returns false if it was already available.
    pub fn release(&mut self, id: HitId) -> bool {
        if self.is_available(id) {
            return false;
        }
        let Some((_, layer)) = self.slots.get(id.index()).copied().flatten() else {
            return false;
        };
        let pos = self.layers[layer as usize]
            .binary_search_by(|probe| self.compare(*probe, id))
            .unwrap_or_else(|pos| pos);
        self.layers[layer as usize].insert(pos, id);
        self.available[id.index()] = true;
        self.n_available += 1;
        true
    }

    /// Claims every hit of `ids`.
    pub fn claim_all(&mut self, ids: &[HitId]) {
        for &id in ids {
            self.claim(id);
        }
    }

    /// Releases every hit of `ids`.
    pub fn release_all(&mut self, ids: &[HitId]) {
        for &id in ids {
            self.release(id);
        }
    }
}
