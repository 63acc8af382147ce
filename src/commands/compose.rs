use std::fs;

use mockup::MockupResult;
use tracing::info;

use crate::cli::{ComposeCommand, GlobalOptions};

use super::utils::{
    build_compositor, derive_variant_path, load_rgba, load_template, resolve_effect_config,
};

/// Run the compose command.
pub fn run(global: &GlobalOptions, cmd: ComposeCommand) -> MockupResult<()> {
    let config = resolve_effect_config(&cmd.effects)?;
    let template = load_template(&cmd.template)?;
    let creatives = cmd
        .creatives
        .iter()
        .map(|path| load_rgba(path))
        .collect::<MockupResult<Vec<_>>>()?;
    let time_of_day = cmd
        .time_of_day
        .map(Into::into)
        .unwrap_or(template.time_of_day);

    let output_path = cmd
        .output
        .clone()
        .unwrap_or_else(|| derive_variant_path(&cmd.template, "mockup", "png"));

    let compositor = build_compositor(global)?;
    let (width, height) = template.background.dimensions();

    let frames = compositor.render_frames(&template, &creatives, &config, time_of_day)?;
    if let Some(dir) = &cmd.export_layers {
        fs::create_dir_all(dir)?;
        for frame in &frames {
            let path = dir.join(format!("frame-{}.png", frame.report.frame_index));
            frame.layer.to_canvas(width, height).to_srgba().save(&path)?;
            println!("Frame layer PNG saved to {}", path.display());
        }
    }

    let result = compositor.merge_frames(&template, frames, &config);
    result.save(&output_path)?;
    info!(frames = result.frames().len(), %time_of_day, "composite finished");
    println!("Mockup PNG saved to {}", output_path.display());

    if cmd.report {
        println!("{}", serde_json::to_string_pretty(result.frames())?);
    }

    Ok(())
}
