//! Supersampled perspective warp of a creative into a frame, with a feathered
//! coverage edge and an optional contact shadow.

use ndarray::{Array3, Axis, s};

use crate::color::LinearImage;
use crate::config::{EffectConfig, TimeOfDay};
use crate::error::GeometryError;
use crate::filter::{blur_reach, box_downsample, radius_to_sigma};
use crate::geometry::{Homography, PixelBounds, Point, Quad, SourceRect, WarpSource, compute_homography};
use crate::illumination::glow_sigma;
use crate::layer::FrameLayer;
use crate::mask::{contact_shadow_mask, feather_mask};
use crate::{MockupError, MockupResult};

/// Output rows warped per pass; bounds the size of the supersampled buffer.
const BAND_ROWS: u32 = 32;

/// A creative warped onto one frame, before grading.
#[derive(Debug, Clone)]
pub struct WarpedFrame {
    pub layer: FrameLayer,
    /// Creative pixel space to background pixel space.
    pub transform: Homography,
}

/// Pixels of margin a frame layer needs around its quad for the feathered
/// edge, the shadow and the night glow to fit.
pub fn layer_padding(quad: &Quad, config: &EffectConfig, time_of_day: TimeOfDay) -> u32 {
    let edge = blur_reach(radius_to_sigma(config.edge_blur.max(0.0)));
    let mut outer = 0;
    if config.shadow_intensity > 0.0 {
        let offset = config.shadow_offset.max(0.0).ceil() as u32;
        outer = offset + blur_reach(radius_to_sigma(shadow_radius(config)));
    }
    if time_of_day == TimeOfDay::Night && config.depth_multiplier > 0.0 {
        outer = outer.max(blur_reach(glow_sigma(quad)));
    }
    edge + outer + 1
}

fn shadow_radius(config: &EffectConfig) -> f32 {
    config.edge_blur.max(0.0) + config.shadow_offset.max(0.0)
}

/// Warp `creative` onto `quad` of a `canvas`-sized photo.
///
/// The warp is rendered at `edge_supersample_factor` times the resolution and
/// box-averaged back down in linear light, which antialiases the frame
/// outline. The resulting coverage is then feathered by `edge_blur` pixels.
#[tracing::instrument(
    level = "debug",
    skip(creative, config),
    fields(creative = ?creative.dimensions())
)]
pub fn render_frame_layer(
    creative: &LinearImage,
    quad: &Quad,
    canvas: (u32, u32),
    config: &EffectConfig,
    time_of_day: TimeOfDay,
    frame: usize,
) -> MockupResult<WarpedFrame> {
    let transform = compute_homography(SourceRect::of(creative), quad)
        .map_err(|e| MockupError::geometry(frame, e))?;

    let bounds = quad.bounds(layer_padding(quad, config, time_of_day), canvas.0, canvas.1);
    if bounds.is_empty() {
        return Err(MockupError::compositing(format!(
            "frame {frame} lies entirely outside the {}x{} background",
            canvas.0, canvas.1
        )));
    }
    tracing::trace!(?bounds, "frame layer bounds");

    let factor = config.edge_supersample_factor.max(1);
    let warped = supersample_warp(creative, &transform, bounds, factor)
        .map_err(|e| MockupError::geometry(frame, e))?;

    let coverage = feather_mask(&warped.alpha(), config.edge_blur);
    let shadow = (config.shadow_intensity > 0.0)
        .then(|| contact_shadow_mask(&coverage, config.shadow_offset, shadow_radius(config)));
    let image = warped.with_channel(3, &coverage);

    let layer = FrameLayer::new(bounds, image)?.with_shadow(shadow);
    Ok(WarpedFrame { layer, transform })
}

/// Warp at `factor`× resolution band by band and average back down.
fn supersample_warp(
    creative: &LinearImage,
    transform: &Homography,
    bounds: PixelBounds,
    factor: u32,
) -> Result<LinearImage, GeometryError> {
    let source = WarpSource::new(creative)?;
    let origin = Point::new(f64::from(bounds.x), f64::from(bounds.y));
    let local = transform.rescaled(origin, f64::from(factor));

    let mut out = Array3::<f32>::zeros((bounds.height as usize, bounds.width as usize, 4));
    let mut row = 0;
    while row < bounds.height {
        let rows = BAND_ROWS.min(bounds.height - row);
        let band = PixelBounds::new(0, row * factor, bounds.width * factor, rows * factor);
        let fine = source.sample(&local, band).into_array();
        let coarse = downsample_straight_alpha(fine, factor as usize);
        out.slice_mut(s![row as usize..(row + rows) as usize, .., ..])
            .assign(&coarse);
        row += rows;
    }
    Ok(LinearImage::from_array(out))
}

/// Box-average RGBA weighting colour by alpha; fully transparent blocks keep
/// the plain colour average.
fn downsample_straight_alpha(mut fine: Array3<f32>, factor: usize) -> Array3<f32> {
    if factor <= 1 {
        return fine;
    }
    let plain = box_downsample(&fine, factor);
    for mut px in fine.lanes_mut(Axis(2)) {
        let a = px[3];
        for c in 0..3 {
            px[c] *= a;
        }
    }
    let mut premul = box_downsample(&fine, factor);
    for (mut px, flat) in premul.lanes_mut(Axis(2)).into_iter().zip(plain.lanes(Axis(2))) {
        let a = px[3];
        for c in 0..3 {
            px[c] = if a > 0.0 { px[c] / a } else { flat[c] };
        }
    }
    premul
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::mask::transition_band;

    fn red(w: u32, h: u32) -> LinearImage {
        LinearImage::from_pixel(w, h, [1.0, 0.0, 0.0, 1.0])
    }

    mod render_frame_layer {
        use super::*;

        #[test]
        fn flat_config_is_a_hard_cutout() {
            let quad = Quad::rect(5.0, 5.0, 10.0, 10.0);
            let out = render_frame_layer(&red(10, 10), &quad, (30, 30), &EffectConfig::flat(), TimeOfDay::Day, 0).unwrap();
            let layer = &out.layer;
            assert_eq!(layer.bounds(), PixelBounds::new(4, 4, 12, 12));
            assert!(layer.shadow().is_none());
            let alpha = layer.image().alpha();
            assert_eq!(transition_band(&alpha), 0);
            // Local (1, 1) is photo pixel (5, 5).
            assert!(alpha[[1, 1]] > 0.9999);
            assert!(alpha[[10, 10]] > 0.9999);
            assert_eq!(alpha[[0, 0]], 0.0);
            assert_eq!(alpha[[11, 11]], 0.0);
        }

        #[test]
        fn supersampling_antialiases_a_slanted_edge() {
            let quad = Quad::new([
                Point::new(10.0, 10.0),
                Point::new(50.0, 14.0),
                Point::new(48.0, 50.0),
                Point::new(12.0, 46.0),
            ]);
            let hard = render_frame_layer(&red(20, 20), &quad, (64, 64), &EffectConfig::flat(), TimeOfDay::Day, 0).unwrap();
            let smooth = render_frame_layer(
                &red(20, 20),
                &quad,
                (64, 64),
                &EffectConfig::flat().with_supersample_factor(4),
                TimeOfDay::Day,
                0,
            )
            .unwrap();
            assert_eq!(transition_band(&hard.layer.image().alpha()), 0);
            assert!(transition_band(&smooth.layer.image().alpha()) > 0);
        }

        #[test]
        fn edge_blur_widens_transition() {
            let quad = Quad::rect(20.0, 20.0, 40.0, 40.0);
            let band = |blur: f32| {
                let config = EffectConfig::flat().with_edge_blur(blur);
                let out = render_frame_layer(&red(16, 16), &quad, (100, 100), &config, TimeOfDay::Day, 0).unwrap();
                transition_band(&out.layer.image().alpha())
            };
            let (narrow, wide) = (band(3.0), band(12.0));
            assert!(narrow > 0);
            assert!(wide > narrow, "{wide} <= {narrow}");
        }

        #[test]
        fn default_config_has_soft_edge_and_opaque_centre() {
            let quad = Quad::rect(20.0, 20.0, 60.0, 40.0);
            let out = render_frame_layer(&red(30, 20), &quad, (100, 100), &EffectConfig::default(), TimeOfDay::Day, 0).unwrap();
            let layer = &out.layer;
            let b = layer.bounds();
            let centre = layer.image().get(50 - b.x, 40 - b.y);
            assert!((centre[3] - 1.0).abs() < 1e-4);
            assert!((centre[0] - 1.0).abs() < 1e-4);
            assert!(transition_band(&layer.image().alpha()) > 0);
            assert!(layer.shadow().is_some());
        }

        #[test]
        fn bounds_clipped_to_photo() {
            let quad = Quad::rect(-10.0, -10.0, 30.0, 30.0);
            let out = render_frame_layer(&red(8, 8), &quad, (15, 15), &EffectConfig::flat(), TimeOfDay::Day, 0).unwrap();
            assert_eq!(out.layer.bounds(), PixelBounds::new(0, 0, 15, 15));
        }

        #[test]
        fn frame_outside_photo_fails() {
            let quad = Quad::rect(200.0, 200.0, 30.0, 30.0);
            let err = render_frame_layer(&red(8, 8), &quad, (50, 50), &EffectConfig::flat(), TimeOfDay::Day, 2).unwrap_err();
            assert!(matches!(err, MockupError::Compositing(ref m) if m.contains("frame 2")));
        }

        #[test]
        fn bad_quad_reports_frame_index() {
            let quad = Quad::new([Point::new(3.0, 3.0); 4]);
            let err = render_frame_layer(&red(8, 8), &quad, (50, 50), &EffectConfig::flat(), TimeOfDay::Day, 4).unwrap_err();
            assert!(matches!(err, MockupError::Geometry { frame: 4, .. }));
        }

        #[test]
        fn half_covered_edge_pixel_is_averaged_in_linear_light() {
            let white = LinearImage::from_pixel(8, 8, [1.0, 1.0, 1.0, 1.0]);
            let quad = Quad::rect(10.5, 4.0, 20.0, 12.0);
            let config = EffectConfig::flat().with_supersample_factor(4);
            let out = render_frame_layer(&white, &quad, (40, 20), &config, TimeOfDay::Day, 0).unwrap();
            let b = out.layer.bounds();
            let px = out.layer.image().get(10 - b.x, 10 - b.y);
            assert!((px[3] - 0.5).abs() < 1e-4, "{px:?}");
            assert!((px[0] - 1.0).abs() < 1e-4, "{px:?}");
            // Over black the pixel carries half the light: sRGB 188, not 128.
            let over_black = crate::color::encode_u8(px[0] * px[3]);
            assert_eq!(over_black, 188);
        }

        #[test]
        fn tall_layer_spans_several_bands() {
            let quad = Quad::rect(2.0, 2.0, 6.0, 100.0);
            let config = EffectConfig::flat().with_supersample_factor(2);
            let out = render_frame_layer(&red(4, 4), &quad, (10, 110), &config, TimeOfDay::Day, 0).unwrap();
            let alpha = out.layer.image().alpha();
            let b = out.layer.bounds();
            for y in [3u32, 40, 70, 100] {
                assert!(alpha[[(y - b.y) as usize, (5 - b.x) as usize]] > 0.999, "row {y}");
            }
        }
    }

    mod layer_padding {
        use super::*;

        #[test]
        fn flat_config_needs_one_pixel() {
            let quad = Quad::rect(0.0, 0.0, 500.0, 300.0);
            assert_eq!(layer_padding(&quad, &EffectConfig::flat(), TimeOfDay::Night), 1);
        }

        #[test]
        fn night_glow_widens_the_margin() {
            let quad = Quad::rect(0.0, 0.0, 1000.0, 600.0);
            let config = EffectConfig::default().with_shadow_intensity(0.0);
            let day = layer_padding(&quad, &config, TimeOfDay::Day);
            let night = layer_padding(&quad, &config, TimeOfDay::Night);
            assert_eq!(day, 8 + 1);
            // Bloom sigma is 24 px for a 600 px tall frame, reaching 48 px.
            assert_eq!(night, 8 + 48 + 1);
        }

        #[test]
        fn shadow_margin_covers_offset_and_blur() {
            let quad = Quad::rect(0.0, 0.0, 100.0, 100.0);
            let config = EffectConfig::flat()
                .with_shadow_intensity(0.5)
                .with_shadow_offset(3.0)
                .with_edge_blur(4.0);
            assert_eq!(layer_padding(&quad, &config, TimeOfDay::Day), 4 + 3 + 7 + 1);
        }
    }

    mod downsample_straight_alpha {
        use super::*;

        #[test]
        fn transparent_samples_do_not_tint() {
            let mut fine = Array3::<f32>::zeros((2, 2, 4));
            fine[[0, 0, 0]] = 1.0;
            fine[[0, 0, 3]] = 1.0;
            // The other three samples are transparent black.
            let out = downsample_straight_alpha(fine, 2);
            assert!((out[[0, 0, 0]] - 1.0).abs() < 1e-6);
            assert!((out[[0, 0, 3]] - 0.25).abs() < 1e-6);
        }
    }
}
