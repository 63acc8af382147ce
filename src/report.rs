use mockup::{GeometryError, MockupError};

pub fn report_error(err: &MockupError) {
    match err {
        MockupError::FrameCountMismatch { frames, got } => {
            eprintln!("{err}");
            eprintln!();
            eprintln!("The template has {frames} frame(s) but {got} creative(s) were given:");
            eprintln!("  - Pass a single --creative to repeat it on every frame");
            if *frames > 1 {
                eprintln!("  - Or pass exactly {frames} creatives, one per frame in order");
            }
        }
        MockupError::Geometry { frame, source } => {
            eprintln!("{err}");
            eprintln!();
            eprintln!("Frame {frame} cannot be used as a billboard face.");
            match source {
                GeometryError::SelfIntersecting | GeometryError::NonConvex => eprintln!(
                    "Check that its points are ordered top-left, top-right, bottom-right, bottom-left."
                ),
                GeometryError::Collinear { .. } | GeometryError::Degenerate { .. } => {
                    eprintln!("Its corners are too close together or lie on one line.")
                }
                _ => {}
            }
            eprintln!("Run `mockup inspect --template <manifest>` to list every frame.");
        }
        MockupError::InvalidEffectConfig { .. } => {
            eprintln!("{err}");
            eprintln!("Run `mockup config` to print the defaults and their accepted ranges.");
        }
        _ => {
            eprintln!("{err}");
        }
    }
}
