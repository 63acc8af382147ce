//! Lighting passes: night glow, daytime haze, vignette and contact-shadow strength.
//!
//! Each pass takes a buffer and returns a new one.

use image::{Rgb, Rgb32FImage};
use imageproc::filter::gaussian_blur_f32;
use ndarray::Array3;

use crate::color::{LinearImage, luminance, srgb_to_linear};
use crate::geometry::Quad;
use crate::layer::FrameLayer;

/// Haze opacity at `depth_multiplier == 1`.
const HAZE_AMOUNT: f32 = 0.12;
const MAX_HAZE: f32 = 0.6;
/// sRGB colour of the haze veil, a slightly cool white.
const HAZE_COLOR: [f32; 3] = [0.92, 0.94, 0.97];
/// Linear luminance above which the creative starts to bloom.
const GLOW_THRESHOLD: f32 = 0.45;
/// Bloom gain at `depth_multiplier == 1`.
const GLOW_AMOUNT: f32 = 0.6;
/// Bloom sigma as a fraction of the frame's shorter side.
const GLOW_SPREAD: f32 = 0.04;
const MIN_GLOW_SIGMA: f32 = 1.0;

/// Wash the creative towards a low-contrast white, as direct sun and
/// atmosphere do to an unlit board.
pub fn apply_haze(layer: &FrameLayer, depth_multiplier: f32) -> FrameLayer {
    let amount = (HAZE_AMOUNT * depth_multiplier).clamp(0.0, MAX_HAZE);
    if amount == 0.0 {
        return layer.clone();
    }
    let veil = HAZE_COLOR.map(srgb_to_linear);
    let image = layer.image().map_rgb(|rgb| {
        [
            rgb[0] * (1.0 - amount) + veil[0] * amount,
            rgb[1] * (1.0 - amount) + veil[1] * amount,
            rgb[2] * (1.0 - amount) + veil[2] * amount,
        ]
    });
    layer.clone().with_image(image)
}

/// Bloom sigma for a frame: a fixed share of its shorter side.
pub fn glow_sigma(quad: &Quad) -> f32 {
    let (min, max) = quad.extent();
    let side = (max.x - min.x).min(max.y - min.y) as f32;
    (GLOW_SPREAD * side).max(MIN_GLOW_SIGMA)
}

/// Bloom from the bright parts of the creative, as from a backlit sign.
///
/// The bloom is stored as additive emission on the layer, so it spills past
/// the frame edge onto the photo. It reaches `blur_reach(sigma)` pixels past
/// the creative; the layer must have that much room.
pub fn apply_glow(layer: &FrameLayer, depth_multiplier: f32, sigma: f32) -> FrameLayer {
    let gain = GLOW_AMOUNT * depth_multiplier.max(0.0);
    let image = layer.image();
    let (w, h) = image.dimensions();
    if gain == 0.0 || w == 0 || h == 0 {
        return layer.clone();
    }

    let bright = Rgb32FImage::from_fn(w, h, |x, y| {
        let px = image.get(x, y);
        let l = luminance([px[0], px[1], px[2]]);
        let weight = px[3] * ((l - GLOW_THRESHOLD) / (1.0 - GLOW_THRESHOLD)).clamp(0.0, 1.0);
        Rgb([px[0] * weight, px[1] * weight, px[2] * weight])
    });
    let bloom = gaussian_blur_f32(&bright, sigma.max(MIN_GLOW_SIGMA));

    let mut emission = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        bloom.get_pixel(x as u32, y as u32)[c] * gain
    });
    if let Some(existing) = layer.emission() {
        emission += existing;
    }
    layer.clone().with_emission(Some(emission))
}

/// Scale the contact shadow's opacity; `0` removes it.
pub fn apply_shadow_intensity(layer: &FrameLayer, intensity: f32) -> FrameLayer {
    let shadow = match layer.shadow() {
        Some(_) if intensity <= 0.0 => None,
        Some(s) => Some(s.mapv(|v| (v * intensity).clamp(0.0, 1.0))),
        None => None,
    };
    layer.clone().with_shadow(shadow)
}

/// Radial darkening from the centre of the whole composite.
///
/// Corners are darkened by `strength`; the centre is untouched.
pub fn apply_vignette(image: &LinearImage, strength: f32) -> LinearImage {
    if strength <= 0.0 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let max_d2 = cx * cx + cy * cy;
    let mut out = image.clone();
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let r2 = if max_d2 > 0.0 {
                ((dx * dx + dy * dy) / max_d2).min(1.0)
            } else {
                0.0
            };
            let falloff = r2 * r2 * (3.0 - 2.0 * r2.sqrt());
            let gain = 1.0 - strength * falloff.clamp(0.0, 1.0);
            let mut px = image.get(x, y);
            for c in 0..3 {
                px[c] *= gain;
            }
            out.put(x, y, px);
        }
    }
    out
}
