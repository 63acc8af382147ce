use crate::template::Frame;
use crate::{MockupError, MockupResult};

/// One creative placed on one frame.
#[derive(Debug)]
pub struct CreativeAssignment<'a, C> {
    pub frame_index: usize,
    pub creative_index: usize,
    pub creative: &'a C,
}

impl<C> Clone for CreativeAssignment<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CreativeAssignment<'_, C> {}

/// Pair creatives with frames.
///
/// A single creative is repeated on every frame; otherwise creatives must
/// match the frames one to one and are assigned in order. Any other count is
/// a [`MockupError::FrameCountMismatch`].
pub fn match_creatives<'a, C>(
    creatives: &'a [C],
    frames: &[Frame],
) -> MockupResult<Vec<CreativeAssignment<'a, C>>> {
    if frames.is_empty() {
        return Err(MockupError::EmptyTemplate);
    }
    let shared = match creatives.len() {
        1 => true,
        n if n == frames.len() => false,
        got => {
            return Err(MockupError::FrameCountMismatch {
                frames: frames.len(),
                got,
            });
        }
    };
    Ok((0..frames.len())
        .map(|frame_index| {
            let creative_index = if shared { 0 } else { frame_index };
            CreativeAssignment {
                frame_index,
                creative_index,
                creative: &creatives[creative_index],
            }
        })
        .collect())
}
