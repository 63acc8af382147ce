use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mockup::{EffectOverrides, TimeOfDay};

/// Command line interface definition.
#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Worker threads for rendering frames in parallel (frames render sequentially if unset)
    #[arg(long, env = "MOCKUP_THREADS", global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Composite one or more creatives into a template photo
    Compose(ComposeCommand),
    /// Validate a template and show its frames
    Inspect(InspectCommand),
    /// Print the effect configuration as JSON
    Config(ConfigCommand),
}

/// Lighting variant selecting haze or glow.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TimeOfDayArg {
    Day,
    Night,
}

impl From<TimeOfDayArg> for TimeOfDay {
    fn from(value: TimeOfDayArg) -> Self {
        match value {
            TimeOfDayArg::Day => TimeOfDay::Day,
            TimeOfDayArg::Night => TimeOfDay::Night,
        }
    }
}

#[derive(Args, Debug)]
pub struct ComposeCommand {
    /// Template manifest (JSON)
    #[arg(short, long)]
    pub template: PathBuf,
    /// Creative image; give once to repeat it on every frame, or once per frame
    #[arg(short, long = "creative", required = true)]
    pub creatives: Vec<PathBuf>,
    /// Output path (defaults to `<template>-mockup.png`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Lighting variant (defaults to the template's own)
    #[arg(long = "time-of-day", value_enum)]
    pub time_of_day: Option<TimeOfDayArg>,
    /// Save every frame layer as a full-size PNG into this directory
    #[arg(long = "export-layers", value_name = "DIR")]
    pub export_layers: Option<PathBuf>,
    /// Print per-frame placement as JSON after compositing
    #[arg(long)]
    pub report: bool,
    #[command(flatten)]
    pub effects: EffectArgs,
}

#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Template manifest (JSON)
    #[arg(short, long)]
    pub template: PathBuf,
    /// Show how this many creatives would be assigned to the frames
    #[arg(long)]
    pub creatives: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(flatten)]
    pub effects: EffectArgs,
}

/// Effect parameters; unset flags keep the value from `--config` or the default.
#[derive(Args, Debug, Default)]
pub struct EffectArgs {
    /// Effect config JSON; missing fields use defaults
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Feather radius of the frame edge in pixels
    #[arg(long = "edge-blur")]
    pub edge_blur: Option<f32>,
    /// Linear supersampling factor for edge anti-aliasing (1-8)
    #[arg(long = "supersample")]
    pub edge_supersample_factor: Option<u32>,
    /// Strength of night glow or day haze
    #[arg(long = "depth")]
    pub depth_multiplier: Option<f32>,
    /// Brightness shift (-1 to 1)
    #[arg(long, allow_negative_numbers = true)]
    pub brightness: Option<f32>,
    /// Contrast shift (-1 to 1)
    #[arg(long, allow_negative_numbers = true)]
    pub contrast: Option<f32>,
    /// Saturation shift (-1 to 1)
    #[arg(long, allow_negative_numbers = true)]
    pub saturation: Option<f32>,
    /// White balance: positive warms, negative cools (-1 to 1)
    #[arg(long, allow_negative_numbers = true)]
    pub temperature: Option<f32>,
    /// Vignette strength on the final image (0 to 1)
    #[arg(long = "vignette")]
    pub vignette_strength: Option<f32>,
    /// Opacity of the contact shadow (0 to 1)
    #[arg(long = "shadow")]
    pub shadow_intensity: Option<f32>,
    /// Contact shadow offset in pixels
    #[arg(long = "shadow-offset")]
    pub shadow_offset: Option<f32>,
    /// Unsharp-mask amount
    #[arg(long)]
    pub sharpen: Option<f32>,
    /// Gaussian blur radius applied to the creative
    #[arg(long)]
    pub blur: Option<f32>,
}

impl From<&EffectArgs> for EffectOverrides {
    fn from(args: &EffectArgs) -> Self {
        Self {
            edge_blur: args.edge_blur,
            edge_supersample_factor: args.edge_supersample_factor,
            depth_multiplier: args.depth_multiplier,
            brightness: args.brightness,
            contrast: args.contrast,
            saturation: args.saturation,
            temperature: args.temperature,
            vignette_strength: args.vignette_strength,
            shadow_intensity: args.shadow_intensity,
            sharpening: args.sharpen,
            blur: args.blur,
            shadow_offset: args.shadow_offset,
        }
    }
}
