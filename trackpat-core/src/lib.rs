//! trackpat-core: Core types for track pattern recognition.
//!
//! This crate provides the event-scoped hit arena, the detector geometry
//! and fitter contracts, the configuration and the output track types.
//!

pub mod config;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod hit;
pub mod track;

pub use config::{MergeResolution, TrackingConfig, MAX_SPLIT_MULTIPLICITY};
pub use error::{Error, Result};
pub use fit::{
    wrap_angle, AddHitOutcome, DetectorLayer, IncrementalFit, LayerIntersection, TrackFitter,
    TrackState,
};
pub use geometry::{CylindricalGeometry, DetectorGeometry};
pub use hit::{ArenaBuild, Detector, Event, Hit, HitArena, HitId, Point3, RawAuxHit, RawHit};
pub use track::{EventStatistics, SegmentFlags, SegmentId, SegmentStatus, Track};
