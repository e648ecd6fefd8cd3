//! Reconstruction Engine - rebuilds the full puzzle canvas.

use image::RgbaImage;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::catalog::{CompositeId, SegmentId};
use crate::composite::SplitSegments;
use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::manifest::{write_png, WrittenFile};
use crate::processor::Layout;
use crate::raster::{composite_onto, resize, transparent};

/// Result of a reconstruction run.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub canvas: RgbaImage,
    /// Segments placed, in placement order
    pub placed: Vec<SegmentId>,
    /// Catalog segments that never made it onto the canvas
    pub missing: Vec<SegmentId>,
    pub saved: Option<WrittenFile>,
}

/// Reconstruction context: a target size and no source image.
pub struct Reconstructor {
    layout: Layout,
}

impl Reconstructor {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        Ok(Self {
            layout: Layout::new(config.template_size, config)?,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    pub fn blank_canvas(&self) -> RgbaImage {
        transparent(self.layout.size(), self.layout.size())
    }

    /// Places `segment` on a copy of `canvas`.
    ///
    /// The segment is turned by its default rotation, resized to the size its
    /// grid bounding box implies when it does not already match, and
    /// alpha-composited at its corrected anchor pixel.
    pub fn place_segment(
        &self,
        canvas: &RgbaImage,
        segment: &RgbaImage,
        id: SegmentId,
    ) -> RgbaImage {
        let definition = self.layout.catalog().segment(id);
        let rotated = self.layout.raster().rotate(segment, definition.default_rotation);

        let (anchor_x, anchor_y) = definition.anchor_coordinates();
        let (x, y) = self
            .layout
            .grid_to_pixel(f64::from(anchor_x), f64::from(anchor_y), id);

        let (width, height) = self.layout.mapper().placement_size(definition);
        let fitted = if width > 0 && height > 0 && rotated.dimensions() != (width, height) {
            debug!(
                segment = %id,
                from = ?rotated.dimensions(),
                to = ?(width, height),
                "resizing segment"
            );
            resize(&rotated, width, height)
        } else {
            rotated
        };

        let placed = composite_onto(canvas, &fitted, x, y);
        debug!(segment = %id, x, y, "placed segment");
        self.layout.observer().segment_placed(id, &placed);
        placed
    }

    /// Rebuilds the canvas from `<segmentId>.png` files. Missing files are
    /// reported, not fatal.
    pub fn reconstruct(
        &self,
        segments_dir: &Path,
        output: Option<&Path>,
    ) -> Result<Reconstruction> {
        let mut canvas = self.blank_canvas();
        let mut placed = vec![];
        for id in SegmentId::ALL {
            let path = segments_dir.join(id.file_name());
            if !path.exists() {
                warn!(path = %path.display(), "missing segment image");
                continue;
            }
            let segment = image::open(&path)?.into_rgba8();
            canvas = self.place_segment(&canvas, &segment, id);
            placed.push(id);
        }
        self.finish(canvas, placed, output)
    }

    /// Rebuilds the canvas from `<compositeId>.png` files.
    ///
    /// Composites are processed in catalog order and a segment is placed at
    /// most once: the first composite to deliver it wins. A composite that
    /// fails to load or split is logged and skipped.
    pub fn reconstruct_from_composites(
        &self,
        composites_dir: &Path,
        output: Option<&Path>,
    ) -> Result<Reconstruction> {
        let mut assembly = Assembly::new(self.blank_canvas());
        for composite in CompositeId::ALL {
            let path = composites_dir.join(composite.file_name());
            if !path.exists() {
                warn!(path = %path.display(), "missing composite image");
                continue;
            }
            let split = image::open(&path)
                .map_err(Into::into)
                .and_then(|image| self.layout.split_composite(&image.into_rgba8(), composite));
            match split {
                Ok(segments) => assembly.absorb(self, segments),
                Err(e) => error!(composite = %composite, error = %e, "error processing composite"),
            }
        }
        self.finish(assembly.canvas, assembly.order, output)
    }

    fn finish(
        &self,
        canvas: RgbaImage,
        placed: Vec<SegmentId>,
        output: Option<&Path>,
    ) -> Result<Reconstruction> {
        let missing: Vec<SegmentId> = SegmentId::ALL
            .into_iter()
            .filter(|id| !placed.contains(id))
            .collect();
        if !missing.is_empty() {
            let names: Vec<_> = missing.iter().map(|id| id.as_str()).collect();
            warn!(missing = ?names, "segments missing from reconstruction");
        }

        let saved = match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let written = write_png("reconstructed", &canvas, path)?;
                info!(path = %path.display(), "saved reconstruction");
                Some(written)
            }
            None => None,
        };

        Ok(Reconstruction { canvas, placed, missing, saved })
    }
}

/// Canvas under construction plus the first-writer-wins ledger.
struct Assembly {
    canvas: RgbaImage,
    seen: BTreeSet<SegmentId>,
    order: Vec<SegmentId>,
}

impl Assembly {
    fn new(canvas: RgbaImage) -> Self {
        Self {
            canvas,
            seen: BTreeSet::new(),
            order: vec![],
        }
    }

    fn absorb(&mut self, reconstructor: &Reconstructor, segments: SplitSegments) {
        for (id, image) in segments {
            if !self.seen.insert(id) {
                debug!(segment = %id, "segment already placed, skipping");
                continue;
            }
            self.canvas = reconstructor.place_segment(&self.canvas, &image, id);
            self.order.push(id);
        }
    }
}
