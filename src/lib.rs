//! Fortune Teller Core - Puzzle Segmentation Engine
//!
//! Cuts a photographed paper fortune teller into its 13 labeled segments,
//! packs segments into composites for transport, and rebuilds the flat
//! puzzle from either form.
//!
//! # Ground Rules
//! 1. The catalog is fixed; corrections are folded in once per processor
//! 2. Inputs are never mutated; every transform returns a new raster
//! 3. A processor is either extracting or reconstructing, never both
//! 4. Missing files degrade the result, they do not fail the run

pub mod catalog;
pub mod composite;
pub mod config;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod mapper;
pub mod observer;
pub mod processor;
pub mod raster;
pub mod reconstruct;

pub use catalog::{
    Catalog, CompositeDefinition, CompositeId, SegmentDefinition, SegmentId, Split, SplitRegion,
    SplitType,
};
pub use config::{CornerAdjustments, ProcessorConfig};
pub use error::{ProcessError, Result};
pub use extract::Extractor;
pub use manifest::{encode_data_uri, RunManifest, WrittenFile};
pub use observer::{DebugDirObserver, NoopObserver, ProcessObserver};
pub use processor::{Layout, Processor};
pub use reconstruct::{Reconstruction, Reconstructor};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
