//! Colour grading of a creative so it sits in the ambient light of the photo.
//!
//! Every function is `(buffer, strength) -> buffer` and a strength of `0.0`
//! returns an exact copy of its input.

use crate::color::{LinearImage, linear_to_srgb, luminance, srgb_to_linear};
use crate::filter::{blur_color, radius_to_sigma};

/// Channel gains at full warm temperature; cool is the mirror image.
const TEMPERATURE_GAIN: [f32; 3] = [0.15, 0.03, -0.15];
/// Blur radius of the unsharp mask, in pixels.
const SHARPEN_RADIUS: f32 = 3.0;

/// Scale light by `1 + strength`; `-1` is black.
pub fn adjust_brightness(image: &LinearImage, strength: f32) -> LinearImage {
    if strength == 0.0 {
        return image.clone();
    }
    let gain = (1.0 + strength).max(0.0);
    image.map_rgb(|rgb| rgb.map(|c| (c * gain).min(1.0)))
}

/// Stretch (positive) or flatten (negative) tones around perceptual mid-gray.
pub fn adjust_contrast(image: &LinearImage, strength: f32) -> LinearImage {
    if strength == 0.0 {
        return image.clone();
    }
    let gain = (1.0 + strength).max(0.0);
    image.map_rgb(|rgb| {
        rgb.map(|c| {
            let v = linear_to_srgb(c);
            srgb_to_linear(((v - 0.5) * gain + 0.5).clamp(0.0, 1.0))
        })
    })
}

/// Move colours away from (positive) or towards (negative) their luminance.
pub fn adjust_saturation(image: &LinearImage, strength: f32) -> LinearImage {
    if strength == 0.0 {
        return image.clone();
    }
    let gain = (1.0 + strength).max(0.0);
    image.map_rgb(|rgb| {
        let l = luminance(rgb);
        rgb.map(|c| (l + (c - l) * gain).clamp(0.0, 1.0))
    })
}

/// White-balance shift: positive warms, negative cools.
pub fn adjust_temperature(image: &LinearImage, strength: f32) -> LinearImage {
    if strength == 0.0 {
        return image.clone();
    }
    let gains = TEMPERATURE_GAIN.map(|g| 1.0 + g * strength);
    image.map_rgb(|rgb| {
        [
            (rgb[0] * gains[0]).clamp(0.0, 1.0),
            (rgb[1] * gains[1]).clamp(0.0, 1.0),
            (rgb[2] * gains[2]).clamp(0.0, 1.0),
        ]
    })
}

/// Unsharp mask: add `amount` times the difference to a blurred copy.
pub fn sharpen(image: &LinearImage, amount: f32) -> LinearImage {
    if amount == 0.0 {
        return image.clone();
    }
    let blurred = blur_color(image, radius_to_sigma(SHARPEN_RADIUS));
    let mut out = image.clone();
    for y in 0..image.height() {
        for x in 0..image.width() {
            let s = image.get(x, y);
            let b = blurred.get(x, y);
            let mut px = s;
            for c in 0..3 {
                px[c] = (s[c] + amount * (s[c] - b[c])).clamp(0.0, 1.0);
            }
            out.put(x, y, px);
        }
    }
    out
}

/// Gaussian blur of the creative's colour with the given radius in pixels.
///
/// Distinct from edge feathering: alpha is left alone.
pub fn blur(image: &LinearImage, radius: f32) -> LinearImage {
    if radius == 0.0 {
        return image.clone();
    }
    blur_color(image, radius_to_sigma(radius))
}
