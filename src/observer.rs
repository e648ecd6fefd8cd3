//! Checkpoint observers.
//!
//! Engines report finished steps to a [`ProcessObserver`]. Observers only
//! watch; the engines produce the same images with or without one attached.

use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::catalog::{CompositeId, SegmentId};

pub trait ProcessObserver: Send + Sync {
    fn segment_extracted(&self, _segment: SegmentId, _image: &RgbaImage) {}

    fn composite_created(&self, _composite: CompositeId, _image: &RgbaImage) {}

    fn composite_split(&self, _composite: CompositeId, _segments: &[(SegmentId, RgbaImage)]) {}

    /// Called with the whole canvas after `segment` was placed on it.
    fn segment_placed(&self, _segment: SegmentId, _canvas: &RgbaImage) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProcessObserver for NoopObserver {}

/// Saves every checkpoint image as `debug_<name>.png`.
#[derive(Debug, Clone)]
pub struct DebugDirObserver {
    dir: PathBuf,
}

impl DebugDirObserver {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn save(&self, name: &str, image: &RgbaImage) {
        let path = self.dir.join(format!("debug_{name}.png"));
        // A failed debug write must not fail the run.
        if let Err(e) = image.save(&path) {
            warn!(path = %path.display(), error = %e, "could not write debug image");
        }
    }
}

impl ProcessObserver for DebugDirObserver {
    fn segment_extracted(&self, segment: SegmentId, image: &RgbaImage) {
        self.save(&format!("extracted_{segment}"), image);
    }

    fn composite_created(&self, composite: CompositeId, image: &RgbaImage) {
        self.save(&format!("created_{composite}"), image);
    }

    fn composite_split(&self, composite: CompositeId, segments: &[(SegmentId, RgbaImage)]) {
        for (segment, image) in segments {
            self.save(&format!("{composite}_{segment}"), image);
        }
    }

    fn segment_placed(&self, segment: SegmentId, canvas: &RgbaImage) {
        self.save(&format!("placed_{segment}"), canvas);
    }
}
