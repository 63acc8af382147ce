use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use mockup::{Compositor, EffectConfig, EffectOverrides, MockupResult, MockupTemplate, TemplateManifest};
use tracing::{debug, info};

use crate::cli::{EffectArgs, GlobalOptions};

/// Build a compositor honouring the global `--threads` budget.
pub fn build_compositor(global: &GlobalOptions) -> MockupResult<Compositor> {
    let compositor = Compositor::new();
    match global.threads {
        Some(threads) if threads > 1 => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("mockup-frame-{i}"))
                .build()
                .map_err(|e| mockup::MockupError::Compositing(format!("thread pool: {e}")))?;
            debug!(threads, "frame thread pool ready");
            Ok(compositor.with_thread_pool(Arc::new(pool)))
        }
        _ => Ok(compositor),
    }
}

/// Read a template manifest and decode its background photo.
///
/// A relative background path is resolved against the manifest's directory.
pub fn load_template(path: &Path) -> MockupResult<MockupTemplate> {
    let manifest = TemplateManifest::from_json_str(&fs::read_to_string(path)?)?;
    let background = resolve_relative(path, &manifest.background);
    let photo = load_rgba(&background)?;
    info!(
        location = %manifest.location_key,
        frames = manifest.frames.len(),
        "loaded template from {}",
        path.display()
    );
    Ok(manifest.into_template(photo))
}

pub fn load_rgba(path: &Path) -> MockupResult<RgbaImage> {
    let image = image::open(path)?.to_rgba8();
    debug!(width = image.width(), height = image.height(), "decoded {}", path.display());
    Ok(image)
}

/// Effect config from `--config` (or defaults) with individual flags applied on top.
pub fn resolve_effect_config(args: &EffectArgs) -> MockupResult<EffectConfig> {
    let base = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => EffectConfig::default(),
    };
    let config = base.with_overrides(&EffectOverrides::from(args));
    config.validate()?;
    Ok(config)
}

fn resolve_relative(manifest: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    manifest
        .parent()
        .map(|dir| dir.join(target))
        .unwrap_or_else(|| target.to_path_buf())
}

/// Derive a variant file path by appending a suffix before the extension.
pub fn derive_variant_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut derived = input.to_path_buf();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| suffix.to_string());
    let filename = format!("{}-{}.{}", stem, suffix, extension);
    derived.set_file_name(filename);
    derived
}
