//! Extraction Engine - cuts segments out of a loaded source image.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::SegmentId;
use crate::config::ProcessorConfig;
use crate::error::{ProcessError, Result};
use crate::manifest::{write_png, RunManifest};
use crate::mapper::PixelPoint;
use crate::processor::Layout;
use crate::raster::{crop, crop_to_content, paste_masked, polygon_mask};

/// Extraction context: a square source image and the layout derived from it.
pub struct Extractor {
    layout: Layout,
    source: RgbaImage,
}

impl Extractor {
    /// Decodes a PNG or JPEG from disk.
    pub fn open(path: &Path, config: &ProcessorConfig) -> Result<Self> {
        let image = image::open(path)?;
        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "loaded source image"
        );
        Self::from_image(image, config)
    }

    /// Resizes `image` to a square of its smaller side, which becomes the
    /// canvas size.
    pub fn from_image(image: DynamicImage, config: &ProcessorConfig) -> Result<Self> {
        let side = image.width().min(image.height());
        if side == 0 {
            return Err(ProcessError::Configuration("source image is empty".into()));
        }
        let rgba = image.into_rgba8();
        let source = if rgba.width() == rgba.height() {
            rgba
        } else {
            imageops::resize(&rgba, side, side, FilterType::Lanczos3)
        };
        Ok(Self {
            layout: Layout::new(side, config)?,
            source,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    fn masked(&self, id: SegmentId) -> (RgbaImage, Vec<PixelPoint>) {
        let size = self.layout.size();
        let polygon = self
            .layout
            .mapper()
            .extraction_polygon(self.layout.catalog(), id);
        let mask = polygon_mask(size, size, &polygon);
        (paste_masked(&self.source, &mask), polygon)
    }

    /// Cuts `id` out through its polygon and crops to the polygon's vertex
    /// bounding box.
    pub fn extract_segment(&self, id: SegmentId) -> RgbaImage {
        let (masked, polygon) = self.masked(id);
        let clamp = |v: i64| v.max(0) as u32;
        let left = polygon.iter().map(|p| p.0).min().unwrap_or(0);
        let top = polygon.iter().map(|p| p.1).min().unwrap_or(0);
        let right = polygon.iter().map(|p| p.0).max().unwrap_or(0);
        let bottom = polygon.iter().map(|p| p.1).max().unwrap_or(0);
        let segment = crop(&masked, clamp(left), clamp(top), clamp(right), clamp(bottom));

        debug!(
            segment = %id,
            width = segment.width(),
            height = segment.height(),
            "extracted segment"
        );
        self.layout.observer().segment_extracted(id, &segment);
        segment
    }

    /// The central diamond, cropped to its visible content.
    pub fn extract_big_diamond(&self) -> RgbaImage {
        let (masked, _) = self.masked(SegmentId::BigDiamond);
        let diamond = crop_to_content(&masked, 0);

        debug!(width = diamond.width(), height = diamond.height(), "extracted big diamond");
        self.layout
            .observer()
            .segment_extracted(SegmentId::BigDiamond, &diamond);
        diamond
    }

    /// A segment the way it is stored on disk: turned by the inverse of its
    /// default rotation, which placement undoes.
    pub fn stored_segment(&self, id: SegmentId) -> RgbaImage {
        let segment = if id.is_big_diamond() {
            self.extract_big_diamond()
        } else {
            self.extract_segment(id)
        };
        let rotation = self.layout.catalog().segment(id).default_rotation;
        self.layout.raster().rotate(&segment, -rotation)
    }

    /// Writes every catalog segment as `<id>.png` into `output_dir`.
    pub fn extract_all(&self, output_dir: &Path) -> Result<RunManifest> {
        fs::create_dir_all(output_dir)?;
        let mut manifest = RunManifest::new(self.layout.size());
        for id in SegmentId::ALL {
            let segment = self.stored_segment(id);
            manifest
                .files
                .push(write_png(id.as_str(), &segment, &output_dir.join(id.file_name()))?);
        }
        info!(dir = %output_dir.display(), count = manifest.files.len(), "extracted all segments");
        manifest.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn opaque_source(size: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
        }))
    }

    fn extractor(size: u32) -> Extractor {
        Extractor::from_image(opaque_source(size), &ProcessorConfig::default()).unwrap()
    }

    #[test]
    fn test_option_1_crop_is_vertex_bbox() {
        let ex = extractor(400);
        let segment = ex.extract_segment(SegmentId::Option1);
        // Vertices map to (100,0), (100,100), (200,0).
        assert_eq!(segment.dimensions(), (100, 100));
        assert_eq!(*segment.get_pixel(1, 1), *ex.source().get_pixel(101, 1));
        assert_eq!(segment.get_pixel(0, 99)[3], 255);
        assert_eq!(segment.get_pixel(98, 98)[3], 0);
    }

    #[test]
    fn test_big_diamond_crops_to_content() {
        let ex = extractor(400);
        let diamond = ex.extract_big_diamond();
        // The outline row and column at 300 are part of the mask.
        assert_eq!(diamond.dimensions(), (201, 201));
        assert!(diamond.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_non_square_source_is_squared() {
        let wide = DynamicImage::new_rgba8(640, 480);
        let ex = Extractor::from_image(wide, &ProcessorConfig::default()).unwrap();
        assert_eq!(ex.source().dimensions(), (480, 480));
        assert_eq!(ex.layout().size(), 480);
    }

    #[test]
    fn test_stored_segment_undoes_default_rotation() {
        let ex = extractor(400);
        let raw = ex.extract_segment(SegmentId::Option1);
        let stored = ex.stored_segment(SegmentId::Option1);
        assert_eq!(ex.layout().raster().rotate(&stored, 90.0), raw);
    }

    #[test]
    fn test_extract_all_writes_every_segment() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = extractor(200).extract_all(dir.path()).unwrap();
        assert_eq!(manifest.files.len(), 13);
        for id in SegmentId::ALL {
            assert!(dir.path().join(id.file_name()).exists(), "{id} missing");
        }
        assert!(!manifest.manifest_hash.is_empty());
    }
}
