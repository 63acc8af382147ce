use thiserror::Error;

/// Result type alias for operations that may fail with [`MockupError`].
pub type MockupResult<T> = std::result::Result<T, MockupError>;

/// Reasons a frame quadrilateral cannot be used as a warp target.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The quadrilateral encloses (almost) no area.
    #[error("quadrilateral area {area:.3} px² is below the minimum")]
    Degenerate { area: f64 },
    /// Three consecutive corners lie on one line.
    #[error("corners around point {index} are collinear")]
    Collinear { index: usize },
    /// Opposite edges cross each other.
    #[error("quadrilateral edges intersect each other")]
    SelfIntersecting,
    /// A reflex corner; no projective map of a rectangle produces this shape.
    #[error("quadrilateral is not convex")]
    NonConvex,
    /// A coordinate is NaN or infinite.
    #[error("quadrilateral contains a non-finite coordinate")]
    NonFinite,
    /// The linear system for the transform has no unique solution.
    #[error("projective transform is singular")]
    Singular,
    /// The source rectangle has no area.
    #[error("source rectangle {width}x{height} has no area")]
    EmptySource { width: u32, height: u32 },
}

/// Error types that can occur while building a mockup composite.
///
/// Every variant is fatal to the request: the compositor never returns a
/// partially rendered image.
#[derive(Debug, Error)]
pub enum MockupError {
    /// A frame's geometry cannot be warped onto.
    #[error("frame {frame}: {source}")]
    Geometry {
        frame: usize,
        #[source]
        source: GeometryError,
    },
    /// The number of creatives cannot be mapped onto the template's frames.
    #[error("frame count mismatch: expected {}, got {got}", expected_counts(*frames))]
    FrameCountMismatch { frames: usize, got: usize },
    /// A numeric effect parameter is out of range.
    #[error("invalid effect config: {field} = {value} ({reason})")]
    InvalidEffectConfig {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// Buffers that cannot be composited, e.g. a creative with zero area.
    #[error("compositing failed: {0}")]
    Compositing(String),
    /// The template defines no frames.
    #[error("template has no frames")]
    EmptyTemplate,
    /// The caller cancelled the request between frames.
    #[error("compositing cancelled after {completed_frames} frame(s)")]
    Cancelled { completed_frames: usize },
    /// Image loading, decoding, or encoding error.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
    /// File system I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Template manifest or config document could not be parsed.
    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl MockupError {
    pub(crate) fn geometry(frame: usize, source: GeometryError) -> Self {
        MockupError::Geometry { frame, source }
    }

    pub(crate) fn compositing(message: impl Into<String>) -> Self {
        MockupError::Compositing(message.into())
    }
}

/// The creative counts accepted for a template with `frames` frames.
fn expected_counts(frames: usize) -> String {
    if frames <= 1 {
        "1".to_string()
    } else {
        format!("1 or {frames}")
    }
}
