//! trackpat-algorithms: Track finding by nearest-neighbour clustering.
//!
//! This crate provides the pieces of the pattern recognition chain:
//! - **Index** - per-layer availability of hits
//! - **NN clustering** - union-find over adjacent layers with pluggable predicates
//! - **Seeding** - windowed scan with escalating distance cuts and quality filters
//! - **Extension** - fit-driven growth of seeds layer by layer
//! - **Merging** - second-stage clustering of incomplete and curling segments
//!
//! [`TrackFinder`] runs the whole chain on an event. [`HelixFitter`] is a
//! simple reference implementation of the fitter contract.
//!
#![warn(missing_docs)]

mod classify;
mod diagnostics;
mod extension;
mod helix;
pub mod index;
mod merge;
pub mod nn;
mod pickup;
mod pipeline;
pub mod predicate;
mod quality;
mod seeding;
mod segment;

pub use classify::SegmentClassifier;
pub use diagnostics::{duplicate_row_report, truth_purity_report, DuplicateRowIssue, PurityIssue};
pub use extension::{Direction, ExtensionOutcome, SegmentExtender};
pub use helix::{HelixFit, HelixFitter, HelixResolution};
pub use index::HitIndex;
pub use merge::{MergeRound, SegmentMerger};
pub use nn::{MergePredicate, NearestNeighborClustering};
pub use pickup::AuxiliaryPickup;
pub use pipeline::{BatchResult, ConsumedSegment, EventDiagnostics, EventResult, TrackFinder};
pub use predicate::{
    parameter_chi2, CircleCenterDistance, HitDistance, SegmentView, TrackParameterDistance,
};
pub use quality::{
    duplicate_row_fraction, remerge, split_multiplicity, ClusterFilter, DuplicateRows,
    FilterOutcome, MultiplicitySplit,
};
pub use seeding::{windows, SeedScanner, WindowScan};
pub use segment::Segment;

// Re-export the core types used in this crate's signatures
pub use trackpat_core::{IncrementalFit, TrackFitter, TrackingConfig};
