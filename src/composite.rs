//! Composite Engine - builds and splits grouped-segment images.

use image::{GrayImage, RgbaImage};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::catalog::{CompositeDefinition, CompositeId, DiagonalHalf, SegmentId, Split, SplitRegion};
use crate::error::{ProcessError, Result};
use crate::extract::Extractor;
use crate::manifest::{write_png, RunManifest};
use crate::processor::Layout;
use crate::raster::{
    composite_onto, crop, crop_to_content, paste_masked, rect_mask, rotate_expand, transparent,
};

/// Segments recovered from one composite, in definition order.
pub type SplitSegments = Vec<(SegmentId, RgbaImage)>;

/// Packs two segments into one canvas: the first flush with the top-right
/// corner, the second flush with the bottom-left corner.
pub fn combine_tight(first: &RgbaImage, second: &RgbaImage) -> RgbaImage {
    let width = first.width().max(second.width());
    let height = first.height().max(second.height());
    let canvas = transparent(width, height);
    let canvas = composite_onto(&canvas, first, i64::from(width - first.width()), 0);
    composite_onto(&canvas, second, 0, i64::from(height - second.height()))
}

impl Layout {
    /// Lays flap segments into a 2x2 grid whose cells follow the flap
    /// composite's regions. The cell size is the largest input.
    pub fn create_grid_composite(
        &self,
        flaps: &BTreeMap<SegmentId, RgbaImage>,
    ) -> Result<RgbaImage> {
        if flaps.is_empty() {
            return Err(ProcessError::InvalidDefinition(
                "grid composite needs at least one segment".into(),
            ));
        }
        let regions = self.catalog().composite(CompositeId::Flaps).regions();
        let cell_width = flaps.values().map(|s| s.width()).max().unwrap_or(0);
        let cell_height = flaps.values().map(|s| s.height()).max().unwrap_or(0);
        let (width, height) = (cell_width * 2, cell_height * 2);

        let mut canvas = transparent(width, height);
        for (&id, segment) in flaps {
            let region = regions.iter().find(|r| r.segment == id).ok_or_else(|| {
                let flaps = CompositeId::Flaps;
                ProcessError::InvalidDefinition(format!("{id} has no cell in {flaps}"))
            })?;
            let x = (region.bbox[0] * f64::from(width)).round() as i64;
            let y = (region.bbox[1] * f64::from(height)).round() as i64;
            canvas = composite_onto(&canvas, segment, x, y);
        }
        Ok(canvas)
    }

    /// Recovers the segments of `composite` from its image.
    pub fn split_composite(
        &self,
        image: &RgbaImage,
        composite: CompositeId,
    ) -> Result<SplitSegments> {
        self.split_with_definition(image, self.catalog().composite(composite))
    }

    /// Splits `image` by an explicit definition instead of the catalog's.
    pub fn split_with_definition(
        &self,
        image: &RgbaImage,
        definition: &CompositeDefinition,
    ) -> Result<SplitSegments> {
        let composite = definition.id;
        let segments = match &definition.split {
            Split::Diagonal { rotation, upper, lower } => {
                let (top, bottom) = self.split_diagonal(image, *rotation);
                vec![(upper.segment, top), (lower.segment, bottom)]
            }
            Split::Grid { regions } | Split::Custom { regions } => {
                if regions.is_empty() {
                    return Err(ProcessError::InvalidDefinition(format!(
                        "{composite} split requires defined regions"
                    )));
                }
                regions
                    .iter()
                    .map(|region| (region.segment, self.split_region(image, region)))
                    .collect()
            }
        };

        debug!(
            composite = %composite,
            segments = ?segments.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            "split composite"
        );
        self.observer().composite_split(composite, &segments);
        Ok(segments)
    }

    /// Turns the seam horizontal, cuts the canvas at its vertical midpoint with
    /// masks overlapping by `seam_overlap`, and turns each half back.
    fn split_diagonal(&self, image: &RgbaImage, rotation: f64) -> (RgbaImage, RgbaImage) {
        let rotated = rotate_expand(image, rotation);
        let (width, height) = rotated.dimensions();
        let split_y = i64::from(height / 2);
        let overlap = i64::from(self.seam_overlap());
        let (right, bottom) = (i64::from(width), i64::from(height));

        let top_mask = rect_mask(width, height, (0, 0), (right, split_y + overlap));
        let bottom_mask = rect_mask(width, height, (0, split_y - overlap), (right, bottom));

        let restore = |mask: GrayImage| {
            let half = paste_masked(&rotated, &mask);
            crop_to_content(&self.raster().rotate(&half, -rotation), 0)
        };
        (restore(top_mask), restore(bottom_mask))
    }

    fn split_region(&self, image: &RgbaImage, region: &SplitRegion) -> RgbaImage {
        let (width, height) = (f64::from(image.width()), f64::from(image.height()));
        let left = (region.bbox[0] * width) as u32;
        let top = (region.bbox[1] * height) as u32;
        let right = (region.bbox[2] * width) as u32;
        let bottom = (region.bbox[3] * height) as u32;
        let cell = crop(image, left, top, right, bottom);
        crop_to_content(&self.raster().rotate(&cell, region.rotation), 0)
    }

    /// Splits every `<compositeId>.png` found in `input_dir` and writes the
    /// pieces as `<segmentId>.png`. Missing composites are skipped.
    pub fn split_all_composites(&self, input_dir: &Path, output_dir: &Path) -> Result<RunManifest> {
        fs::create_dir_all(output_dir)?;
        let mut manifest = RunManifest::new(self.size());
        for composite in CompositeId::ALL {
            let path = input_dir.join(composite.file_name());
            if !path.exists() {
                warn!(path = %path.display(), "missing composite image");
                continue;
            }
            let image = image::open(&path)?.into_rgba8();
            for (segment, piece) in self.split_composite(&image, composite)? {
                let path = output_dir.join(segment.file_name());
                manifest.files.push(write_png(segment.as_str(), &piece, &path)?);
            }
        }
        info!(dir = %output_dir.display(), count = manifest.files.len(), "split composites");
        manifest.finish()
    }
}

impl Extractor {
    /// Builds a diagonal composite from two option numbers, each rotated
    /// independently first.
    pub fn create_composite(
        &self,
        option1: u8,
        option2: u8,
        rotation1: f64,
        rotation2: f64,
    ) -> Result<RgbaImage> {
        let first = DiagonalHalf { segment: SegmentId::option(option1)?, rotation: rotation1 };
        let second = DiagonalHalf { segment: SegmentId::option(option2)?, rotation: rotation2 };
        Ok(self.build_diagonal(first, second))
    }

    fn build_diagonal(&self, upper: DiagonalHalf, lower: DiagonalHalf) -> RgbaImage {
        let raster = self.layout().raster();
        let first = raster.rotate(&self.extract_segment(upper.segment), upper.rotation);
        let second = raster.rotate(&self.extract_segment(lower.segment), lower.rotation);
        combine_tight(&first, &second)
    }

    fn build(&self, composite: CompositeId) -> Result<RgbaImage> {
        match &self.layout().catalog().composite(composite).split {
            Split::Diagonal { upper, lower, .. } => Ok(self.build_diagonal(*upper, *lower)),
            Split::Grid { regions } => {
                let flaps = regions
                    .iter()
                    .map(|r| (r.segment, self.extract_segment(r.segment)))
                    .collect();
                self.layout().create_grid_composite(&flaps)
            }
            Split::Custom { regions } => match regions.as_slice() {
                [region] if region.segment.is_big_diamond() => Ok(self.extract_big_diamond()),
                [region] => Ok(self.extract_segment(region.segment)),
                _ => Err(ProcessError::InvalidDefinition(format!(
                    "{composite} has no single-region builder"
                ))),
            },
        }
    }

    /// Writes every catalog composite as `<compositeId>.png`. A failing
    /// composite is logged and recorded; the rest still get written.
    pub fn generate_all_composites(&self, output_dir: &Path) -> Result<RunManifest> {
        fs::create_dir_all(output_dir)?;
        let mut manifest = RunManifest::new(self.layout().size());
        for composite in CompositeId::ALL {
            let outcome = self.build(composite).and_then(|image| {
                self.layout().observer().composite_created(composite, &image);
                write_png(composite.as_str(), &image, &output_dir.join(composite.file_name()))
            });
            match outcome {
                Ok(written) => {
                    debug!(
                        composite = %composite,
                        width = written.size[0],
                        height = written.size[1],
                        "created composite"
                    );
                    manifest.files.push(written);
                }
                Err(e) => {
                    error!(composite = %composite, error = %e, "failed to generate composite");
                    manifest.record_failure(composite.as_str(), e);
                }
            }
        }
        info!(dir = %output_dir.display(), count = manifest.files.len(), "generated composites");
        manifest.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use image::{DynamicImage, Rgba};

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    fn layout() -> Layout {
        Layout::new(400, &ProcessorConfig::default()).unwrap()
    }

    #[test]
    fn test_combine_tight_corners() {
        let combined = combine_tight(&solid(10, 4, 50), &solid(6, 8, 200));
        assert_eq!(combined.dimensions(), (10, 8));
        assert_eq!(combined.get_pixel(9, 0)[0], 50);
        assert_eq!(combined.get_pixel(0, 7)[0], 200);
        assert_eq!(combined.get_pixel(9, 7)[3], 0);
    }

    #[test]
    fn test_grid_composite_positions() {
        let flaps: BTreeMap<_, _> = SegmentId::FLAPS
            .iter()
            .zip([10u8, 20, 30, 40])
            .map(|(&id, v)| (id, solid(5, 5, v)))
            .collect();
        let grid = layout().create_grid_composite(&flaps).unwrap();
        assert_eq!(grid.dimensions(), (10, 10));
        assert_eq!(grid.get_pixel(0, 0)[0], 10);
        assert_eq!(grid.get_pixel(9, 0)[0], 20);
        assert_eq!(grid.get_pixel(9, 9)[0], 30);
        assert_eq!(grid.get_pixel(0, 9)[0], 40);
    }

    #[test]
    fn test_grid_composite_rejects_non_flap() {
        let mut flaps = BTreeMap::new();
        flaps.insert(SegmentId::Option3, solid(4, 4, 1));
        let err = layout().create_grid_composite(&flaps).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidDefinition(_)));
    }

    #[test]
    fn test_grid_split_inverts_grid_composite() {
        let layout = layout();
        let flaps: BTreeMap<_, _> = SegmentId::FLAPS
            .iter()
            .zip([60u8, 120, 180, 240])
            .map(|(&id, v)| (id, solid(7, 7, v)))
            .collect();
        let grid = layout.create_grid_composite(&flaps).unwrap();
        let split = layout.split_composite(&grid, CompositeId::Flaps).unwrap();
        assert_eq!(split.len(), 4);
        for (id, image) in split {
            assert_eq!(&image, &flaps[&id], "{id} differs after split");
        }
    }

    #[test]
    fn test_diagonal_split_assigns_upper_and_lower() {
        let layout = layout();
        // Upper-right triangle light, lower-left triangle dark.
        let composite = RgbaImage::from_fn(80, 80, |x, y| {
            if x >= y {
                Rgba([230, 230, 230, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        });
        let split = layout.split_composite(&composite, CompositeId::Options1And6).unwrap();
        let (upper_id, upper) = &split[0];
        let (lower_id, lower) = &split[1];
        assert_eq!(*upper_id, SegmentId::Option1);
        assert_eq!(*lower_id, SegmentId::Option6);

        let mean = |image: &RgbaImage| {
            let opaque: Vec<_> = image.pixels().filter(|p| p[3] == 255).collect();
            opaque.iter().map(|p| f64::from(p[0])).sum::<f64>() / opaque.len() as f64
        };
        assert!(mean(upper) > 180.0);
        assert!(mean(lower) < 70.0);
        for image in [upper, lower] {
            assert!(image.width().abs_diff(80) <= 6 && image.height().abs_diff(80) <= 6);
        }
    }

    #[test]
    fn test_region_split_without_regions_is_invalid() {
        let layout = layout();
        let image = solid(20, 20, 90);
        for split in [Split::Grid { regions: vec![] }, Split::Custom { regions: vec![] }] {
            let definition = CompositeDefinition { id: CompositeId::Flaps, split };
            let err = layout.split_with_definition(&image, &definition).unwrap_err();
            assert!(matches!(err, ProcessError::InvalidDefinition(_)), "{err}");
        }
    }

    #[test]
    fn test_split_with_custom_regions() {
        let layout = layout();
        let image = RgbaImage::from_fn(20, 10, |x, _| {
            if x < 10 {
                Rgba([10, 10, 10, 255])
            } else {
                Rgba([200, 200, 200, 255])
            }
        });
        let definition = CompositeDefinition {
            id: CompositeId::Diamond,
            split: Split::Custom {
                regions: vec![SplitRegion::new([0.5, 0.0, 1.0, 1.0], SegmentId::BigDiamond)],
            },
        };
        let split = layout.split_with_definition(&image, &definition).unwrap();
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].1, solid(10, 10, 200));
    }

    #[test]
    fn test_generate_all_composites() {
        let pixels = RgbaImage::from_pixel(200, 200, Rgba([90, 140, 30, 255]));
        let source = DynamicImage::ImageRgba8(pixels);
        let extractor = Extractor::from_image(source, &ProcessorConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let manifest = extractor.generate_all_composites(dir.path()).unwrap();
        assert!(manifest.failures.is_empty());
        assert_eq!(manifest.files.len(), 6);
        let flaps = image::open(dir.path().join("combo_flaps.png")).unwrap();
        assert_eq!((flaps.width(), flaps.height()), (100, 100));
    }

    #[test]
    fn test_create_composite_rejects_unknown_option() {
        let source = DynamicImage::new_rgba8(40, 40);
        let extractor = Extractor::from_image(source, &ProcessorConfig::default()).unwrap();
        assert!(extractor.create_composite(1, 9, 0.0, 0.0).unwrap_err().is_not_found());
    }
}
