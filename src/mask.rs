//! Coverage masks: feathering the frame edge and casting the contact shadow.

use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::translate;
use ndarray::Array2;

use crate::filter::{blur_plane, image_to_plane, plane_to_image, radius_to_sigma};

/// Soften a coverage mask with a Gaussian of the given radius (in pixels).
///
/// Only the mask is blurred; colour is never touched here. A zero radius
/// returns the mask unchanged.
pub fn feather_mask(coverage: &Array2<f32>, radius: f32) -> Array2<f32> {
    if radius <= 0.0 {
        return coverage.clone();
    }
    blur_plane(coverage, radius_to_sigma(radius))
}

/// Opacity mask for a contact shadow: the feathered mask shifted by `offset`
/// pixels down and to the right, then blurred by `radius`.
pub fn contact_shadow_mask(mask: &Array2<f32>, offset: f32, radius: f32) -> Array2<f32> {
    let plane = plane_to_image(mask);
    let shift = offset.round() as i32;
    let shifted = if shift != 0 {
        translate(&plane, (shift, shift))
    } else {
        plane
    };
    let sigma = radius_to_sigma(radius);
    let blurred = if sigma > 0.0 {
        gaussian_blur_f32(&shifted, sigma)
    } else {
        shifted
    };
    image_to_plane(&blurred)
}

/// Number of pixels that are neither fully transparent nor fully opaque
/// once quantised to 8 bits.
pub fn transition_band(mask: &Array2<f32>) -> usize {
    mask.iter()
        .filter(|v| {
            let byte = (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
            byte != 0 && byte != 255
        })
        .count()
}
