//! Processing Contexts - Extraction vs Reconstruction
//!
//! A [`Processor`] is fixed into one mode when it is built. Asking it for the
//! other mode's context fails with a configuration error.

use std::path::Path;

use crate::catalog::{Catalog, SegmentId};
use crate::config::ProcessorConfig;
use crate::error::{ProcessError, Result};
use crate::extract::Extractor;
use crate::mapper::{CoordinateMapper, PixelPoint};
use crate::observer::{NoopObserver, ProcessObserver};
use crate::raster::RasterOptions;
use crate::reconstruct::Reconstructor;

/// Everything derived from the canvas size: corrected catalog, mapper and
/// raster settings. Built once, read-only afterwards.
pub struct Layout {
    mapper: CoordinateMapper,
    catalog: Catalog,
    raster: RasterOptions,
    seam_overlap: u32,
    observer: Box<dyn ProcessObserver>,
}

impl Layout {
    pub fn new(size: u32, config: &ProcessorConfig) -> Result<Self> {
        if size < 4 {
            return Err(ProcessError::Configuration(format!(
                "canvas size {size} is too small for a 4x4 grid"
            )));
        }
        Ok(Self {
            mapper: CoordinateMapper::new(size),
            catalog: Catalog::new(&config.corner_adjustments),
            raster: RasterOptions::from(config),
            seam_overlap: config.seam_overlap,
            observer: Box::new(NoopObserver),
        })
    }

    pub fn set_observer(&mut self, observer: Box<dyn ProcessObserver>) {
        self.observer = observer;
    }

    pub fn size(&self) -> u32 {
        self.mapper.size()
    }

    pub fn grid_unit(&self) -> f64 {
        self.mapper.grid_unit()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn raster(&self) -> &RasterOptions {
        &self.raster
    }

    pub fn seam_overlap(&self) -> u32 {
        self.seam_overlap
    }

    pub fn observer(&self) -> &dyn ProcessObserver {
        self.observer.as_ref()
    }

    /// Corrected grid-to-pixel mapping for `segment`.
    pub fn grid_to_pixel(&self, x: f64, y: f64, segment: SegmentId) -> PixelPoint {
        self.mapper.grid_to_pixel(x, y, self.catalog.segment(segment))
    }
}

pub enum Processor {
    Extraction(Extractor),
    Reconstruction(Reconstructor),
}

impl Processor {
    /// Extraction mode: loads the source image and fixes the size to its
    /// smaller side.
    pub fn for_image(path: &Path, config: &ProcessorConfig) -> Result<Self> {
        Ok(Self::Extraction(Extractor::open(path, config)?))
    }

    /// Reconstruction mode: no source image, `template_size` canvas.
    pub fn for_template(config: &ProcessorConfig) -> Result<Self> {
        Ok(Self::Reconstruction(Reconstructor::new(config)?))
    }

    pub fn layout(&self) -> &Layout {
        match self {
            Self::Extraction(e) => e.layout(),
            Self::Reconstruction(r) => r.layout(),
        }
    }

    pub fn layout_mut(&mut self) -> &mut Layout {
        match self {
            Self::Extraction(e) => e.layout_mut(),
            Self::Reconstruction(r) => r.layout_mut(),
        }
    }

    pub fn size(&self) -> u32 {
        self.layout().size()
    }

    pub fn extractor(&self) -> Result<&Extractor> {
        match self {
            Self::Extraction(e) => Ok(e),
            Self::Reconstruction(_) => Err(ProcessError::Configuration(
                "no input image loaded for extraction".into(),
            )),
        }
    }

    pub fn reconstructor(&self) -> Result<&Reconstructor> {
        match self {
            Self::Reconstruction(r) => Ok(r),
            Self::Extraction(_) => Err(ProcessError::Configuration(
                "processor was built for extraction, not reconstruction".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_mode_rejects_extraction() {
        let processor = Processor::for_template(&ProcessorConfig::default()).unwrap();
        assert_eq!(processor.size(), 400);
        assert!(matches!(processor.extractor(), Err(ProcessError::Configuration(_))));
        assert!(processor.reconstructor().is_ok());
    }

    #[test]
    fn test_image_mode_rejects_reconstruction() {
        let source = image::DynamicImage::new_rgba8(300, 200);
        let extractor = Extractor::from_image(source, &ProcessorConfig::default()).unwrap();
        let processor = Processor::Extraction(extractor);
        assert_eq!(processor.size(), 200);
        assert!(matches!(processor.reconstructor(), Err(ProcessError::Configuration(_))));
    }

    #[test]
    fn test_tiny_canvas_rejected() {
        let config = ProcessorConfig::default().with_template_size(3);
        assert!(matches!(Processor::for_template(&config), Err(ProcessError::Configuration(_))));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_processors_cross_threads() {
        assert_send_sync::<Layout>();
        assert_send_sync::<Extractor>();
        assert_send_sync::<Reconstructor>();
        assert_send_sync::<Processor>();

        let config = ProcessorConfig::default().with_template_size(40);
        let processor = Processor::for_template(&config).unwrap();
        let canvas = std::thread::spawn(move || processor.reconstructor().map(|r| r.blank_canvas()))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(canvas.dimensions(), (40, 40));
    }

    #[test]
    fn test_layout_grid_to_pixel_uses_corrected_catalog() {
        let layout = Layout::new(400, &ProcessorConfig::default()).unwrap();
        assert_eq!(layout.grid_to_pixel(1.0, 0.0, SegmentId::FlapA), (103, 2));
        assert_eq!(layout.grid_to_pixel(1.0, 1.0, SegmentId::BigDiamond), (100, 100));
        assert_eq!(layout.grid_unit(), 100.0);
    }
}
