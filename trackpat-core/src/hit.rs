//! Hit types and the event-scoped hit arena.

use crate::geometry::DetectorGeometry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point in detector coordinates (mm).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate (drift axis).
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Transverse radius.
    #[inline]
    #[must_use]
    pub fn rho(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Azimuthal angle in `(-pi, pi]`.
    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Length of the position vector.
    #[inline]
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Dot product of two position vectors.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared Euclidean distance.
    #[inline]
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Cosine of the angle between the two position vectors.
    ///
    /// Returns 1.0 when either vector has zero length.
    #[must_use]
    pub fn cos_angle(&self, other: &Self) -> f64 {
        let norm = self.norm() * other.norm();
        if norm == 0.0 {
            return 1.0;
        }
        self.dot(other) / norm
    }
}

/// Stable handle of a hit inside a [`HitArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitId(pub u32);

impl HitId {
    /// Position of the hit inside the arena storage.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Sub-detector a hit was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Detector {
    /// The main pad-row tracker.
    Main,
    /// Inner auxiliary layers, used only by the pickup pass.
    Auxiliary,
}

/// An immutable measurement with its derived layer and bin indices.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Measured position.
    pub position: Point3,
    /// Pad row for main hits, auxiliary layer number otherwise.
    pub layer: u32,
    /// Drift-length bin, only used to gate merging.
    pub bin: u32,
    /// Sub-detector of origin.
    pub detector: Detector,
    /// Optional Monte-Carlo truth label.
    pub truth: Option<u64>,
}

/// Hit record as delivered by the hit source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawHit {
    /// Measured position.
    pub position: Point3,
    /// Optional Monte-Carlo truth label.
    #[cfg_attr(feature = "serde", serde(default))]
    pub truth: Option<u64>,
}

impl RawHit {
    /// Creates a hit record without truth information.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            truth: None,
        }
    }

    /// Attaches a truth label.
    #[must_use]
    pub fn with_truth(mut self, truth: u64) -> Self {
        self.truth = Some(truth);
        self
    }
}

/// Hit record from an auxiliary layer; the layer is known from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawAuxHit {
    /// Measured position.
    pub position: Point3,
    /// Auxiliary layer number (0 = innermost).
    pub layer: u32,
    /// Optional Monte-Carlo truth label.
    #[cfg_attr(feature = "serde", serde(default))]
    pub truth: Option<u64>,
}

/// All hit records of one measurement cycle.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Event number as given by the source.
    #[cfg_attr(feature = "serde", serde(default))]
    pub number: u64,
    /// Main tracker hits.
    pub hits: Vec<RawHit>,
    /// Auxiliary layer hits.
    #[cfg_attr(feature = "serde", serde(default))]
    pub auxiliary_hits: Vec<RawAuxHit>,
}

impl Event {
    /// Creates an event from main tracker hits only.
    #[must_use]
    pub fn new(number: u64, hits: Vec<RawHit>) -> Self {
        Self {
            number,
            hits,
            auxiliary_hits: Vec::new(),
        }
    }

    /// Returns true if the event carries no main tracker hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Event-scoped owner of all hits.
///
/// Every other structure refers to hits through [`HitId`] handles.
#[derive(Debug, Clone, Default)]
pub struct HitArena {
    hits: Vec<Hit>,
}

/// Outcome of building an arena from raw records.
#[derive(Debug, Clone, Default)]
pub struct ArenaBuild {
    /// The populated arena.
    pub arena: HitArena,
    /// Main tracker hits that fell outside every pad row or below the radius cut.
    pub dropped: usize,
}

impl HitArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a hit and returns its handle.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` hits are stored.
    pub fn push(&mut self, hit: Hit) -> HitId {
        let id = HitId(u32::try_from(self.hits.len()).expect("hit arena overflow"));
        self.hits.push(hit);
        id
    }

    /// Builds the arena for one event, deriving layer and bin indices.
    ///
    /// Main hits below `r_min_cut` or outside every pad row are dropped.
    pub fn from_event<G: DetectorGeometry + ?Sized>(
        event: &Event,
        geometry: &G,
        n_bins: u32,
        r_min_cut: f64,
    ) -> ArenaBuild {
        let mut arena = Self {
            hits: Vec::with_capacity(event.hits.len() + event.auxiliary_hits.len()),
        };
        let mut dropped = 0;

        for raw in &event.hits {
            if raw.position.rho() < r_min_cut {
                dropped += 1;
                continue;
            }
            let Some(layer) = geometry.layer_of(&raw.position) else {
                dropped += 1;
                continue;
            };
            arena.push(Hit {
                position: raw.position,
                layer,
                bin: geometry.bin_of(&raw.position, n_bins),
                detector: Detector::Main,
                truth: raw.truth,
            });
        }

        for raw in &event.auxiliary_hits {
            arena.push(Hit {
                position: raw.position,
                layer: raw.layer,
                bin: geometry.bin_of(&raw.position, n_bins),
                detector: Detector::Auxiliary,
                truth: raw.truth,
            });
        }

        ArenaBuild { arena, dropped }
    }

    /// Returns the hit behind a handle.
    ///
    /// # Panics
    /// Panics if the handle does not come from this arena.
    #[inline]
    #[must_use]
    pub fn get(&self, id: HitId) -> &Hit {
        &self.hits[id.index()]
    }

    /// Number of hits stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if no hits are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Iterates over all handles and hits.
    pub fn iter(&self) -> impl Iterator<Item = (HitId, &Hit)> {
        self.hits
            .iter()
            .enumerate()
            .map(|(i, hit)| (HitId(i as u32), hit))
    }

    /// Iterates over the handles of one sub-detector.
    pub fn ids_of(&self, detector: Detector) -> impl Iterator<Item = HitId> + '_ {
        self.iter()
            .filter(move |(_, hit)| hit.detector == detector)
            .map(|(id, _)| id)
    }

    /// Resolves a list of handles.
    #[must_use]
    pub fn resolve(&self, ids: &[HitId]) -> Vec<&Hit> {
        ids.iter().map(|&id| self.get(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CylindricalGeometry;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_geometry() {
        let p = Point3::new(3.0, 4.0, 12.0);
        assert_relative_eq!(p.rho(), 5.0);
        assert_relative_eq!(p.norm(), 13.0);
        assert_relative_eq!(p.distance(&Point3::new(3.0, 4.0, 0.0)), 12.0);
    }

    #[test]
    fn test_cos_angle() {
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::new(0.0, 2.0, 0.0);
        assert_relative_eq!(a.cos_angle(&b), 0.0);
        assert_relative_eq!(a.cos_angle(&a), 1.0);
        assert_relative_eq!(a.cos_angle(&Point3::default()), 1.0);
    }

    #[test]
    fn test_arena_from_event() {
        let geometry = CylindricalGeometry::new(10, 100.0, 200.0, 500.0);
        let event = Event {
            number: 7,
            hits: vec![
                RawHit::new(105.0, 0.0, 10.0),
                RawHit::new(0.0, 195.0, -250.0),
                RawHit::new(50.0, 0.0, 0.0),  // inside the inner radius
                RawHit::new(300.0, 0.0, 0.0), // outside the outer radius
            ],
            auxiliary_hits: vec![RawAuxHit {
                position: Point3::new(30.0, 0.0, 1.0),
                layer: 1,
                truth: Some(4),
            }],
        };

        let build = HitArena::from_event(&event, &geometry, 50, 0.0);
        assert_eq!(build.dropped, 2);
        assert_eq!(build.arena.len(), 3);

        let first = build.arena.get(HitId(0));
        assert_eq!(first.layer, 0);
        assert_eq!(first.detector, Detector::Main);
        assert_eq!(build.arena.get(HitId(1)).layer, 9);
        assert_eq!(build.arena.get(HitId(1)).bin, 25);

        let aux = build.arena.get(HitId(2));
        assert_eq!(aux.detector, Detector::Auxiliary);
        assert_eq!(aux.layer, 1);
        assert_eq!(build.arena.ids_of(Detector::Main).count(), 2);
    }

    #[test]
    fn test_arena_radius_cut() {
        let geometry = CylindricalGeometry::new(10, 100.0, 200.0, 500.0);
        let event = Event::new(0, vec![RawHit::new(110.0, 0.0, 0.0), RawHit::new(190.0, 0.0, 0.0)]);
        let build = HitArena::from_event(&event, &geometry, 50, 150.0);
        assert_eq!(build.dropped, 1);
        assert_eq!(build.arena.get(HitId(0)).layer, 9);
    }
}
