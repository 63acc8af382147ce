pub mod adjust;
pub mod color;
pub mod config;
pub mod edge;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod illumination;
pub mod layer;
pub mod mask;
pub mod matcher;
pub mod pipeline;
pub mod template;

pub use config::{EffectConfig, EffectOverrides, Finish, TimeOfDay};
pub use error::{GeometryError, MockupError, MockupResult};
pub use geometry::{Homography, PixelBounds, Point, Quad};
pub use layer::FrameLayer;
pub use matcher::{CreativeAssignment, match_creatives};
pub use pipeline::{CompositeStage, ImageFilter, LayerFilter};
pub use template::{Frame, MockupTemplate, TemplateManifest};

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbaImage;
use rayon::ThreadPool;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::color::LinearImage;
use crate::edge::render_frame_layer;
use crate::illumination::apply_vignette;
use crate::layer::merge_layer;
use crate::pipeline::{apply_filters, filters_for};

/// Entry point for compositing creatives onto billboard templates.
///
/// A compositor holds no image state; one instance can serve any number of
/// requests. By default frames render one after another on the calling
/// thread.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    /// Executor for rendering frames of one request in parallel. Its thread
    /// count is the per-request frame budget.
    pool: Option<Arc<ThreadPool>>,
    /// Checked before each frame starts rendering.
    cancellation: Option<CancellationToken>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render frames on `pool` instead of the calling thread.
    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Abort between frames once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Composite `creatives` into every frame of `template`.
    ///
    /// `time_of_day` selects haze (day) or glow (night) and takes precedence
    /// over the template's own lighting tag. Nothing is returned unless every
    /// frame rendered.
    #[tracing::instrument(
        skip_all,
        fields(
            location = %template.location_key,
            frames = template.frames.len(),
            creatives = creatives.len(),
            time_of_day = %time_of_day,
        )
    )]
    pub fn composite(
        &self,
        template: &MockupTemplate,
        creatives: &[RgbaImage],
        config: &EffectConfig,
        time_of_day: TimeOfDay,
    ) -> MockupResult<CompositeResult> {
        let rendered = self.render_frames(template, creatives, config, time_of_day)?;
        Ok(self.merge_frames(template, rendered, config))
    }

    /// Paint rendered frames onto the background in frame order and apply the
    /// vignette.
    pub fn merge_frames(
        &self,
        template: &MockupTemplate,
        rendered: Vec<RenderedFrame>,
        config: &EffectConfig,
    ) -> CompositeResult {
        debug!(stage = %CompositeStage::Merging, "merging {} layer(s)", rendered.len());
        let mut canvas = LinearImage::from_srgba(&template.background);
        for frame in &rendered {
            trace!(stage = %CompositeStage::Merging, frame = frame.report.frame_index);
            canvas = merge_layer(&canvas, &frame.layer);
        }

        debug!(
            stage = %CompositeStage::VignetteAndFinalize,
            strength = config.vignette_strength
        );
        let image = apply_vignette(&canvas, config.vignette_strength).to_srgba();

        debug!(stage = %CompositeStage::Done);
        CompositeResult {
            image,
            frames: rendered.into_iter().map(|f| f.report).collect(),
        }
    }

    /// Run every stage up to merging and return the per-frame layers in frame
    /// order. [`Compositor::merge_frames`] paints these onto the background.
    pub fn render_frames(
        &self,
        template: &MockupTemplate,
        creatives: &[RgbaImage],
        config: &EffectConfig,
        time_of_day: TimeOfDay,
    ) -> MockupResult<Vec<RenderedFrame>> {
        debug!(stage = %CompositeStage::Validating);
        let configs = validate_request(template, creatives, config)
            .map_err(failed(CompositeStage::Validating))?;
        if time_of_day != template.time_of_day {
            debug!(
                template = %template.time_of_day,
                requested = %time_of_day,
                "requested lighting overrides the template's"
            );
        }

        debug!(stage = %CompositeStage::Matching);
        let assignments = match_creatives(creatives, &template.frames)
            .map_err(failed(CompositeStage::Matching))?;

        let mut linear: Vec<Option<LinearImage>> = vec![None; creatives.len()];
        for a in &assignments {
            linear[a.creative_index].get_or_insert_with(|| LinearImage::from_srgba(a.creative));
        }

        let canvas = template.background.dimensions();
        let completed = AtomicUsize::new(0);
        let render = |a: &CreativeAssignment<'_, RgbaImage>| -> MockupResult<RenderedFrame> {
            if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                let completed_frames = completed.load(Ordering::Acquire);
                warn!(
                    stage = %CompositeStage::Failed,
                    frame = a.frame_index,
                    completed_frames,
                    "cancelled before the frame started"
                );
                return Err(MockupError::Cancelled { completed_frames });
            }
            let creative = linear[a.creative_index].as_ref().ok_or_else(|| {
                MockupError::compositing(format!("creative {} was not decoded", a.creative_index))
            })?;
            let frame = render_frame(
                creative,
                &template.frames[a.frame_index],
                a,
                canvas,
                &configs[a.frame_index],
                time_of_day,
            )?;
            completed.fetch_add(1, Ordering::AcqRel);
            Ok(frame)
        };

        match &self.pool {
            Some(pool) => {
                debug!(threads = pool.current_num_threads(), "rendering frames in parallel");
                pool.install(|| assignments.par_iter().map(render).collect::<MockupResult<Vec<_>>>())
            }
            None => assignments.iter().map(render).collect(),
        }
    }
}

/// One frame after grading and lighting, ready to merge.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub report: FrameReport,
    pub layer: FrameLayer,
}

/// What was drawn where for one frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FrameReport {
    pub frame_index: usize,
    pub creative_index: usize,
    /// Creative pixel space to background pixel space.
    pub transform: Homography,
    /// Area of the background the frame's layer covers.
    pub bounds: PixelBounds,
}

/// Output of a successful composite.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    image: RgbaImage,
    frames: Vec<FrameReport>,
}

impl CompositeResult {
    /// Get a reference to the composited photo.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the result and return the composited photo.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn frames(&self) -> &[FrameReport] {
        &self.frames
    }

    /// Save the composited photo to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> MockupResult<()> {
        self.image.save(path)?;
        Ok(())
    }
}

/// Composite on the calling thread without cancellation.
pub fn composite(
    template: &MockupTemplate,
    creatives: &[RgbaImage],
    config: &EffectConfig,
    time_of_day: TimeOfDay,
) -> MockupResult<CompositeResult> {
    Compositor::new().composite(template, creatives, config, time_of_day)
}

/// Resolve and check every frame's config, the template and the creatives
/// before any pixel work.
fn validate_request(
    template: &MockupTemplate,
    creatives: &[RgbaImage],
    config: &EffectConfig,
) -> MockupResult<Vec<EffectConfig>> {
    config.validate()?;
    template.validate()?;
    let configs: Vec<EffectConfig> = template
        .frames
        .iter()
        .map(|f| f.effective_config(config))
        .collect();
    for (index, c) in configs.iter().enumerate() {
        c.validate().inspect_err(|e| warn!(frame = index, "frame override rejected: {e}"))?;
    }
    for (index, creative) in creatives.iter().enumerate() {
        let (w, h) = creative.dimensions();
        if w == 0 || h == 0 {
            return Err(MockupError::compositing(format!(
                "creative {index} is {w}x{h} and has no area"
            )));
        }
    }
    Ok(configs)
}

fn render_frame(
    creative: &LinearImage,
    frame: &Frame,
    assignment: &CreativeAssignment<'_, RgbaImage>,
    canvas: (u32, u32),
    config: &EffectConfig,
    time_of_day: TimeOfDay,
) -> MockupResult<RenderedFrame> {
    let index = assignment.frame_index;
    trace!(stage = %CompositeStage::Warping, frame = index);
    let warped = render_frame_layer(creative, frame.quad(), canvas, config, time_of_day, index)
        .map_err(|e| frame_failed(render_failure_stage(&e), index)(e))?;
    trace!(stage = %CompositeStage::EdgeCompositing, frame = index, bounds = ?warped.layer.bounds());

    let (grading, lighting): (Vec<LayerFilter>, Vec<LayerFilter>) =
        filters_for(time_of_day, config, frame.quad())
            .into_iter()
            .partition(|f| f.stage() == CompositeStage::ColorGrading);
    trace!(stage = %CompositeStage::ColorGrading, frame = index, filters = grading.len());
    let layer = apply_filters(&warped.layer, &grading);
    trace!(stage = %CompositeStage::IlluminationEffects, frame = index, filters = lighting.len());
    let layer = apply_filters(&layer, &lighting);

    Ok(RenderedFrame {
        report: FrameReport {
            frame_index: index,
            creative_index: assignment.creative_index,
            transform: warped.transform,
            bounds: layer.bounds(),
        },
        layer,
    })
}

fn failed(stage: CompositeStage) -> impl Fn(MockupError) -> MockupError {
    move |error| {
        warn!(stage = %CompositeStage::Failed, failed_in = %stage, "{error}");
        error
    }
}

/// Stage a frame render error belongs to.
fn render_failure_stage(error: &MockupError) -> CompositeStage {
    match error {
        MockupError::Geometry { .. } => CompositeStage::Warping,
        _ => CompositeStage::EdgeCompositing,
    }
}

fn frame_failed(stage: CompositeStage, frame: usize) -> impl Fn(MockupError) -> MockupError {
    move |error| {
        warn!(stage = %CompositeStage::Failed, failed_in = %stage, frame, "{error}");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod render_failure_stage {
        use super::*;

        #[test]
        fn geometry_errors_fail_in_warping() {
            let err = MockupError::Geometry {
                frame: 1,
                source: GeometryError::NonConvex,
            };
            assert_eq!(render_failure_stage(&err), CompositeStage::Warping);
        }

        #[test]
        fn other_errors_fail_in_edge_compositing() {
            let err = MockupError::compositing("frame 0 has no visible pixels");
            assert_eq!(render_failure_stage(&err), CompositeStage::EdgeCompositing);
        }
    }
}
