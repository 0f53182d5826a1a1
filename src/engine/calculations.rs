//! Pure calculation functions for output geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::error::{SpectrumError, engine_error, names};
use crate::requirements::{CropRegion, CropRequirement, ResizeMode};

/// A pixel rectangle inside an image, `x`/`y` being the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Calculate dimensions that fit inside a target box (never upscaling).
///
/// The result keeps the source aspect ratio; one dimension matches the target
/// and the other is at most the target. Sources already inside the box are
/// returned unchanged.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Bounding box dimensions (width, height)
///
/// # Examples
/// ```
/// # use spectrum::engine::calculations::calculate_fit_dimensions;
/// // 800x530 into 400x400 → width limits
/// assert_eq!(calculate_fit_dimensions((800, 530), (400, 400)), (400, 265));
///
/// // never upscales
/// assert_eq!(calculate_fit_dimensions((100, 50), (400, 400)), (100, 50));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if src_w <= tgt_w && src_h <= tgt_h {
        return source;
    }

    if src_w as u64 * tgt_h as u64 > src_h as u64 * tgt_w as u64 {
        // Source is wider than the box: width limits
        let h = (src_h as f64 * tgt_w as f64 / src_w as f64).round() as u32;
        (tgt_w, h.max(1))
    } else {
        // Source is taller: height limits
        let w = (src_w as f64 * tgt_h as f64 / src_h as f64).round() as u32;
        (w.max(1), tgt_h)
    }
}

/// Calculate the smallest dimensions that cover a target box (never upscaling).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may
/// exceed. When covering would require upscaling the source is returned as is.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if src_w <= tgt_w || src_h <= tgt_h {
        return source;
    }

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Output dimensions of a resize in the given mode.
///
/// `Exact` and `ExactOrSmaller` fit inside the target; `ExactOrLarger` covers
/// it. Aspect ratio is always preserved, so `Exact` may fall short in one
/// dimension.
pub fn calculate_resize_dimensions(
    source: (u32, u32),
    mode: ResizeMode,
    target: (u32, u32),
) -> (u32, u32) {
    match mode {
        ResizeMode::Exact | ResizeMode::ExactOrSmaller => calculate_fit_dimensions(source, target),
        ResizeMode::ExactOrLarger => calculate_fill_dimensions(source, target),
    }
}

/// Resolve a crop requirement to a pixel rectangle of a `source`-sized image.
///
/// Absolute regions must lie inside the image. Relative regions are rounded
/// to whole pixels and always keep at least one pixel in each direction.
pub fn calculate_crop_rect(
    source: (u32, u32),
    crop: &CropRequirement,
) -> Result<CropRect, SpectrumError> {
    let (src_w, src_h) = source;
    match crop.region() {
        CropRegion::AbsoluteToOrigin {
            left,
            top,
            right,
            bottom,
        } => {
            if right > src_w || bottom > src_h {
                return Err(engine_error!(
                    names::CROP_OUT_OF_BOUNDS,
                    "crop ({left}, {top}, {right}, {bottom}) exceeds image {src_w}x{src_h}"
                ));
            }
            Ok(CropRect {
                x: left,
                y: top,
                width: right - left,
                height: bottom - top,
            })
        }
        CropRegion::RelativeToOrigin {
            left,
            top,
            right,
            bottom,
        } => {
            let scale = |ratio: f32, extent: u32| (ratio as f64 * extent as f64).round() as u32;
            let x = scale(left, src_w).min(src_w.saturating_sub(1));
            let y = scale(top, src_h).min(src_h.saturating_sub(1));
            let right = scale(right, src_w).clamp(x + 1, src_w.max(x + 1));
            let bottom = scale(bottom, src_h).clamp(y + 1, src_h.max(y + 1));
            Ok(CropRect {
                x,
                y,
                width: right - x,
                height: bottom - y,
            })
        }
    }
}

/// Dimensions after rotating clockwise by `degrees` (a multiple of 90).
pub fn rotated_dimensions(source: (u32, u32), degrees: i32) -> (u32, u32) {
    match degrees.rem_euclid(360) {
        90 | 270 => (source.1, source.0),
        _ => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_fit_dimensions tests
    // =========================================================================

    #[test]
    fn fit_landscape_into_square() {
        assert_eq!(calculate_fit_dimensions((800, 530), (400, 400)), (400, 265));
    }

    #[test]
    fn fit_portrait_into_square() {
        assert_eq!(calculate_fit_dimensions((600, 1200), (300, 300)), (150, 300));
    }

    #[test]
    fn fit_exact_aspect_matches_target() {
        assert_eq!(calculate_fit_dimensions((960, 640), (480, 320)), (480, 320));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(calculate_fit_dimensions((100, 50), (400, 400)), (100, 50));
        assert_eq!(calculate_fit_dimensions((400, 400), (400, 400)), (400, 400));
    }

    #[test]
    fn fit_keeps_at_least_one_pixel() {
        assert_eq!(calculate_fit_dimensions((10000, 1), (100, 100)), (100, 1));
    }

    // =========================================================================
    // calculate_fill_dimensions tests
    // =========================================================================

    #[test]
    fn fill_wider_source() {
        // 2:1 source into 1:1 target → height matches
        assert_eq!(calculate_fill_dimensions((2000, 1000), (400, 400)), (800, 400));
    }

    #[test]
    fn fill_taller_source() {
        assert_eq!(calculate_fill_dimensions((1000, 2000), (400, 400)), (400, 800));
    }

    #[test]
    fn fill_never_upscales() {
        assert_eq!(calculate_fill_dimensions((300, 900), (400, 400)), (300, 900));
    }

    #[test]
    fn resize_modes_dispatch() {
        assert_eq!(
            calculate_resize_dimensions((2000, 1000), ResizeMode::ExactOrSmaller, (400, 400)),
            (400, 200)
        );
        assert_eq!(
            calculate_resize_dimensions((2000, 1000), ResizeMode::ExactOrLarger, (400, 400)),
            (800, 400)
        );
    }

    // =========================================================================
    // calculate_crop_rect tests
    // =========================================================================

    #[test]
    fn absolute_crop_inside_image() {
        let crop = CropRequirement::absolute(100, 50, 300, 150, true).unwrap();
        let rect = calculate_crop_rect((800, 530), &crop).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 100,
                y: 50,
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn absolute_crop_outside_image_is_error() {
        let crop = CropRequirement::absolute(100, 50, 900, 150, true).unwrap();
        let err = calculate_crop_rect((800, 530), &crop).unwrap_err();
        assert!(err.is(names::CROP_OUT_OF_BOUNDS));
    }

    #[test]
    fn relative_crop_rounds_to_pixels() {
        let crop = CropRequirement::relative(0.25, 0.0, 0.75, 0.5, false).unwrap();
        let rect = calculate_crop_rect((800, 530), &crop).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 200,
                y: 0,
                width: 400,
                height: 265
            }
        );
    }

    #[test]
    fn tiny_relative_crop_keeps_one_pixel() {
        let crop = CropRequirement::relative(0.5, 0.5, 0.5001, 0.5001, false).unwrap();
        let rect = calculate_crop_rect((10, 10), &crop).unwrap();
        assert_eq!((rect.width, rect.height), (1, 1));
    }

    #[test]
    fn rotation_swaps_dimensions_on_quarter_turns() {
        assert_eq!(rotated_dimensions((800, 530), 90), (530, 800));
        assert_eq!(rotated_dimensions((800, 530), -90), (530, 800));
        assert_eq!(rotated_dimensions((800, 530), 180), (800, 530));
    }
}
