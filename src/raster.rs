//! Raster Transform Utilities
//!
//! Every function takes its input by reference and returns a new buffer.
//! Nothing here mutates a caller-held image.
//!
//! Rotation angles are in degrees, counter-clockwise as seen on screen.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, Rgba32FImage, RgbaImage};

use crate::config::ProcessorConfig;
use crate::mapper::PixelPoint;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Tunables shared by the rotation and cleanup helpers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub rotation_padding: f64,
    pub alpha_threshold: u8,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self::from(&ProcessorConfig::default())
    }
}

impl From<&ProcessorConfig> for RasterOptions {
    fn from(config: &ProcessorConfig) -> Self {
        Self {
            rotation_padding: config.rotation_padding,
            alpha_threshold: config.alpha_threshold,
        }
    }
}

impl RasterOptions {
    /// Rotates a segment without clipping it.
    ///
    /// The canvas is padded by `rotation_padding` of its larger side on every
    /// edge, rotated about its center with canvas expansion, cropped back to
    /// content and finally has its alpha binarized at `alpha_threshold` so no
    /// resampling halo survives.
    pub fn rotate(&self, image: &RgbaImage, angle: f64) -> RgbaImage {
        if angle == 0.0 {
            return image.clone();
        }
        let padding = (f64::from(image.width().max(image.height())) * self.rotation_padding) as u32;
        let mut padded = transparent(image.width() + 2 * padding, image.height() + 2 * padding);
        imageops::replace(&mut padded, image, i64::from(padding), i64::from(padding));

        let rotated = rotate_expand(&padded, angle);
        binarize_alpha(&crop_to_content(&rotated, 0), self.alpha_threshold)
    }

    /// Rotate if asked, crop to content, then optionally clean the edges.
    pub fn process_segment(&self, image: &RgbaImage, rotation: f64, clean: bool) -> RgbaImage {
        let rotated = self.rotate(image, rotation);
        let cropped = crop_to_content(&rotated, 0);
        if clean {
            clean_edges(&cropped, self.alpha_threshold)
        } else {
            cropped
        }
    }
}

/// [`RasterOptions::rotate`] with default options.
pub fn rotate(image: &RgbaImage, angle: f64) -> RgbaImage {
    RasterOptions::default().rotate(image, angle)
}

pub fn transparent(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, TRANSPARENT)
}

/// Half-open bounding box `(left, top, right, bottom)` of non-zero alpha.
pub fn content_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x + 1, y + 1),
            Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x + 1), b.max(y + 1)),
        });
    }
    bounds
}

/// Crops to non-transparent content grown by `padding`, clamped to the image.
/// A fully transparent image comes back unchanged.
pub fn crop_to_content(image: &RgbaImage, padding: u32) -> RgbaImage {
    let Some((left, top, right, bottom)) = content_bounds(image) else {
        return image.clone();
    };
    let left = left.saturating_sub(padding);
    let top = top.saturating_sub(padding);
    let right = (right + padding).min(image.width());
    let bottom = (bottom + padding).min(image.height());
    crop(image, left, top, right, bottom)
}

/// Half-open crop clamped to the image bounds.
pub fn crop(image: &RgbaImage, left: u32, top: u32, right: u32, bottom: u32) -> RgbaImage {
    let right = right.min(image.width());
    let bottom = bottom.min(image.height());
    let left = left.min(right);
    let top = top.min(bottom);
    imageops::crop_imm(image, left, top, right - left, bottom - top).to_image()
}

/// Alpha below `threshold` becomes 0, everything else 255.
pub fn binarize_alpha(image: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[3] = if pixel[3] < threshold { 0 } else { 255 };
    }
    out
}

/// Drops semi-transparent fringe pixels and zeroes the color of every fully
/// transparent pixel so nothing bleeds when composited later.
pub fn clean_edges(image: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if pixel[3] > 0 && pixel[3] < threshold {
            pixel[3] = 0;
        }
        if pixel[3] == 0 {
            *pixel = TRANSPARENT;
        }
    }
    out
}

/// High-quality resize used when a segment arrives at the wrong size.
///
/// Lanczos3 runs on premultiplied `f32` samples so the transparent black
/// around a segment never bleeds into its visible edge.
pub fn resize(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    let premultiplied = Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let alpha = f32::from(p[3]) / 255.0;
        let channel = |v: u8| f32::from(v) / 255.0 * alpha;
        Rgba([channel(p[0]), channel(p[1]), channel(p[2]), alpha])
    });
    let resized = imageops::resize(&premultiplied, width, height, FilterType::Lanczos3);
    RgbaImage::from_fn(width, height, |x, y| unpremultiply(resized.get_pixel(x, y)))
}

fn unpremultiply(p: &Rgba<f32>) -> Rgba<u8> {
    let alpha = p[3].clamp(0.0, 1.0);
    let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    if quantize(alpha) == 0 {
        return TRANSPARENT;
    }
    let channel = |v: f32| quantize(v / alpha);
    Rgba([channel(p[0]), channel(p[1]), channel(p[2]), quantize(alpha)])
}

/// Alpha-composites `top` over a copy of `canvas` at `(x, y)`.
pub fn composite_onto(canvas: &RgbaImage, top: &RgbaImage, x: i64, y: i64) -> RgbaImage {
    let mut out = canvas.clone();
    imageops::overlay(&mut out, top, x, y);
    out
}

/// Copies `source` through `mask` onto a transparent canvas of the mask's size.
pub fn paste_masked(source: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let mut out = transparent(mask.width(), mask.height());
    let width = mask.width().min(source.width());
    let height = mask.height().min(source.height());
    for y in 0..height {
        for x in 0..width {
            let coverage = u32::from(mask.get_pixel(x, y)[0]);
            if coverage == 0 {
                continue;
            }
            let src = source.get_pixel(x, y);
            let blended = if coverage == 255 {
                *src
            } else {
                Rgba([
                    src[0],
                    src[1],
                    src[2],
                    ((u32::from(src[3]) * coverage + 127) / 255) as u8,
                ])
            };
            out.put_pixel(x, y, blended);
        }
    }
    out
}

/// Filled polygon mask. Pixels on the outline count as inside.
pub fn polygon_mask(width: u32, height: u32, points: &[PixelPoint]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if points.len() < 3 {
        return mask;
    }
    let min_y = points.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let max_y = points
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(0)
        .min(i64::from(height) - 1);

    let edges: Vec<(PixelPoint, PixelPoint)> = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&a, &b)| (a, b))
        .collect();

    let mut crossings = Vec::with_capacity(edges.len());
    for y in min_y..=max_y {
        crossings.clear();
        let fy = y as f64;
        for &((x0, y0), (x1, y1)) in &edges {
            if y0 == y1 {
                continue;
            }
            let (lo, hi) = if y0 < y1 { ((x0, y0), (x1, y1)) } else { ((x1, y1), (x0, y0)) };
            if y < lo.1 || y >= hi.1 {
                continue;
            }
            let t = (fy - lo.1 as f64) / (hi.1 - lo.1) as f64;
            crossings.push(lo.0 as f64 + t * (hi.0 - lo.0) as f64);
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            fill_span(&mut mask, y, span[0].ceil() as i64, span[1].floor() as i64);
        }
    }

    for &(a, b) in &edges {
        draw_line(&mut mask, a, b);
    }
    mask
}

/// Rectangle mask with inclusive corners.
pub fn rect_mask(
    width: u32,
    height: u32,
    top_left: PixelPoint,
    bottom_right: PixelPoint,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for y in top_left.1.max(0)..=bottom_right.1.min(i64::from(height) - 1) {
        fill_span(&mut mask, y, top_left.0, bottom_right.0);
    }
    mask
}

fn fill_span(mask: &mut GrayImage, y: i64, from: i64, to: i64) {
    if y < 0 || y >= i64::from(mask.height()) {
        return;
    }
    let from = from.max(0);
    let to = to.min(i64::from(mask.width()) - 1);
    for x in from..=to {
        mask.put_pixel(x as u32, y as u32, Luma([255]));
    }
}

fn draw_line(mask: &mut GrayImage, from: PixelPoint, to: PixelPoint) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let step_x = if x < to.0 { 1 } else { -1 };
    let step_y = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        fill_span(mask, y, x, x);
        if (x, y) == to {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x += step_x;
        }
        if doubled <= dx {
            err += dx;
            y += step_y;
        }
    }
}

/// Rotates about the image center, growing the canvas to fit the result.
///
/// Right angles are exact pixel permutations; other angles are resampled
/// bicubically in premultiplied alpha.
pub fn rotate_expand(image: &RgbaImage, angle: f64) -> RgbaImage {
    let normalized = angle.rem_euclid(360.0);
    if normalized == 0.0 {
        return image.clone();
    }
    if normalized == 90.0 {
        return imageops::rotate270(image);
    }
    if normalized == 180.0 {
        return imageops::rotate180(image);
    }
    if normalized == 270.0 {
        return imageops::rotate90(image);
    }

    let (sin, cos) = angle.to_radians().sin_cos();
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let out_w = fitted_extent(w * cos.abs() + h * sin.abs());
    let out_h = fitted_extent(w * sin.abs() + h * cos.abs());

    let mut out = transparent(out_w, out_h);
    let (half_out_w, half_out_h) = (f64::from(out_w) / 2.0, f64::from(out_h) / 2.0);
    for (ox, oy, pixel) in out.enumerate_pixels_mut() {
        let dx = f64::from(ox) + 0.5 - half_out_w;
        let dy = f64::from(oy) + 0.5 - half_out_h;
        // Inverse of a counter-clockwise turn in y-down coordinates.
        let sx = w / 2.0 + dx * cos - dy * sin - 0.5;
        let sy = h / 2.0 + dx * sin + dy * cos - 0.5;
        *pixel = sample_bicubic(image, sx, sy);
    }
    out
}

fn fitted_extent(extent: f64) -> u32 {
    (extent - 1e-6).ceil().max(1.0) as u32
}

fn cubic_weight(distance: f64) -> f64 {
    const A: f64 = -0.5;
    let d = distance.abs();
    if d < 1.0 {
        ((A + 2.0) * d - (A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((A * d - 5.0 * A) * d + 8.0 * A) * d - 4.0 * A
    } else {
        0.0
    }
}

fn sample_bicubic(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let (x0, y0) = (x.floor(), y.floor());
    if x0 < -2.0 || y0 < -2.0 || x0 > w as f64 + 1.0 || y0 > h as f64 + 1.0 {
        return TRANSPARENT;
    }
    let (tx, ty) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 4];
    for j in -1..=2 {
        let py = y0 + j;
        if py < 0 || py >= h {
            continue;
        }
        let wy = cubic_weight(ty - j as f64);
        for i in -1..=2 {
            let px = x0 + i;
            if px < 0 || px >= w {
                continue;
            }
            let weight = wy * cubic_weight(tx - i as f64);
            let p = image.get_pixel(px as u32, py as u32);
            let alpha = f64::from(p[3]);
            acc[0] += weight * f64::from(p[0]) * alpha;
            acc[1] += weight * f64::from(p[1]) * alpha;
            acc[2] += weight * f64::from(p[2]) * alpha;
            acc[3] += weight * alpha;
        }
    }

    if acc[3] <= 0.5 {
        return TRANSPARENT;
    }
    let channel = |v: f64| (v / acc[3]).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(acc[0]),
        channel(acc[1]),
        channel(acc[2]),
        acc[3].round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let image = checker(17, 9);
        assert_eq!(rotate(&image, 0.0), image);
    }

    #[test]
    fn test_rotate_right_angle_swaps_dimensions() {
        let image = checker(30, 10);
        let rotated = rotate(&image, 90.0);
        assert_eq!(rotated.dimensions(), (10, 30));
        // Counter-clockwise: the top-right source pixel ends up top-left.
        assert_eq!(rotated.get_pixel(0, 0), image.get_pixel(29, 0));
    }

    #[test]
    fn test_rotate_there_and_back_is_lossless_for_right_angles() {
        let image = checker(12, 20);
        let back = rotate(&rotate(&image, -90.0), 90.0);
        assert_eq!(back, image);
        let flipped = rotate(&rotate(&image, -180.0), -180.0);
        assert_eq!(flipped, image);
    }

    #[test]
    fn test_rotate_binarizes_alpha() {
        let image = checker(40, 40);
        let rotated = rotate(&image, 30.0);
        assert!(rotated.pixels().all(|p| p[3] == 0 || p[3] == 255));
        // A rotated square is wider than its source.
        assert!(rotated.width() > 40 && rotated.width() <= 60);
    }

    #[test]
    fn test_rotate_expand_45_fits_diagonal() {
        let image = checker(10, 10);
        let rotated = rotate_expand(&image, 45.0);
        assert_eq!(rotated.dimensions(), (15, 15));
        let center = rotated.get_pixel(7, 7);
        assert_eq!(center[3], 255);
    }

    #[test]
    fn test_crop_to_content_transparent_unchanged() {
        let image = transparent(23, 11);
        let cropped = crop_to_content(&image, 4);
        assert_eq!(cropped.dimensions(), (23, 11));
    }

    #[test]
    fn test_crop_to_content_with_padding() {
        let mut image = transparent(20, 20);
        image.put_pixel(5, 6, Rgba([1, 2, 3, 200]));
        image.put_pixel(8, 7, Rgba([1, 2, 3, 1]));
        assert_eq!(crop_to_content(&image, 0).dimensions(), (4, 2));
        assert_eq!(crop_to_content(&image, 2).dimensions(), (8, 6));
        assert_eq!(crop_to_content(&image, 100).dimensions(), (20, 20));
    }

    #[test]
    fn test_clean_edges() {
        let mut image = transparent(3, 1);
        image.put_pixel(0, 0, Rgba([200, 100, 50, 127]));
        image.put_pixel(1, 0, Rgba([200, 100, 50, 128]));
        image.put_pixel(2, 0, Rgba([9, 9, 9, 0]));
        let cleaned = clean_edges(&image, 128);
        assert_eq!(*cleaned.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*cleaned.get_pixel(1, 0), Rgba([200, 100, 50, 128]));
        assert_eq!(*cleaned.get_pixel(2, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_polygon_mask_includes_outline() {
        let mask = polygon_mask(20, 20, &[(2, 2), (2, 12), (12, 2)]);
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(12, 2)[0], 255);
        assert_eq!(mask.get_pixel(2, 12)[0], 255);
        assert_eq!(mask.get_pixel(7, 7)[0], 255);
        assert_eq!(mask.get_pixel(8, 8)[0], 0);
        assert_eq!(mask.get_pixel(1, 2)[0], 0);
    }

    #[test]
    fn test_rect_mask_inclusive() {
        let mask = rect_mask(10, 10, (0, 0), (9, 4));
        assert_eq!(mask.get_pixel(9, 4)[0], 255);
        assert_eq!(mask.get_pixel(9, 5)[0], 0);
    }

    #[test]
    fn test_paste_masked_leaves_outside_transparent() {
        let source = checker(10, 10);
        let mask = rect_mask(10, 10, (2, 2), (4, 4));
        let pasted = paste_masked(&source, &mask);
        assert_eq!(pasted.get_pixel(3, 3), source.get_pixel(3, 3));
        assert_eq!(pasted.get_pixel(5, 5)[3], 0);
    }

    #[test]
    fn test_composite_onto_does_not_touch_canvas() {
        let canvas = transparent(8, 8);
        let top = checker(2, 2);
        let placed = composite_onto(&canvas, &top, 3, 3);
        assert_eq!(canvas.pixels().filter(|p| p[3] > 0).count(), 0);
        assert_eq!(placed.get_pixel(4, 4), top.get_pixel(1, 1));
    }

    #[test]
    fn test_resize_keeps_triangle_edges_bright() {
        // White upper-left triangle on transparent black.
        let triangle = RgbaImage::from_fn(100, 100, |x, y| {
            if x + y < 100 {
                Rgba([255, 255, 255, 255])
            } else {
                TRANSPARENT
            }
        });
        let resized = resize(&triangle, 101, 101);
        assert_eq!(resized.dimensions(), (101, 101));
        for p in resized.pixels().filter(|p| p[3] > 0) {
            assert_eq!([p[0], p[1], p[2]], [255, 255, 255], "dark fringe pixel {p:?}");
        }

        let white = RgbaImage::from_pixel(101, 101, Rgba([255, 255, 255, 255]));
        let placed = composite_onto(&white, &resized, 0, 0);
        let darkest = placed.pixels().map(|p| p[0].min(p[1]).min(p[2])).min().unwrap();
        assert!(darkest >= 254, "darkest composited pixel {darkest}");
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let image = checker(12, 7);
        assert_eq!(resize(&image, 12, 7), image);
    }

    #[test]
    fn test_process_segment_crops_and_cleans() {
        let mut image = transparent(10, 10);
        for x in 3..6 {
            image.put_pixel(x, 4, Rgba([50, 60, 70, 255]));
        }
        image.put_pixel(6, 4, Rgba([50, 60, 70, 20]));
        let processed = RasterOptions::default().process_segment(&image, 0.0, true);
        assert_eq!(processed.dimensions(), (4, 1));
        assert_eq!(processed.get_pixel(3, 0)[3], 0);
    }
}
