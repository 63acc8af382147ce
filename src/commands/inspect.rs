use mockup::{MockupResult, match_creatives};

use crate::cli::InspectCommand;

use super::utils::load_template;

/// Run the inspect command.
pub fn run(cmd: InspectCommand) -> MockupResult<()> {
    let template = load_template(&cmd.template)?;
    let (width, height) = template.background.dimensions();
    println!(
        "{} ({}, {}): {}x{} photo, {} frame(s)",
        template.location_key,
        template.time_of_day,
        template.finish,
        width,
        height,
        template.frames.len()
    );
    for (index, frame) in template.frames.iter().enumerate() {
        let b = frame.bounds(width, height);
        let overrides = match &frame.effect_overrides {
            Some(o) if !o.is_empty() => " [overrides]",
            _ => "",
        };
        println!(
            "  frame {index}: area {:.1} px², bounds {}x{} at ({}, {}){overrides}",
            frame.quad().area(),
            b.width,
            b.height,
            b.x,
            b.y
        );
    }
    template.validate()?;
    println!("Template is valid");

    if let Some(count) = cmd.creatives {
        let slots: Vec<usize> = (0..count).collect();
        for a in match_creatives(&slots, &template.frames)? {
            println!("  creative {} -> frame {}", a.creative_index, a.frame_index);
        }
    }
    Ok(())
}
