//! Host-reported format capabilities and per-format compression bounds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::CompressOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One entry returned by the `get_supported_extensions` command.
pub struct SupportedExtension {
    /// Extension without the leading dot.
    pub ext: String,
    /// Whether the host can decode this format.
    pub readable: bool,
    /// Whether the host can encode this format.
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One entry returned by the `get_compress_options_context` command.
pub struct CompressOptionsContext {
    /// Target extension these bounds apply to.
    pub extension: String,
    /// Lowest accepted quality.
    pub min: f32,
    /// Highest accepted quality.
    pub max: f32,
    /// Quality used when the caller supplies none.
    pub default: f32,
    /// Slider granularity; non-positive disables snapping.
    pub step: f32,
}

impl CompressOptionsContext {
    /// Clamps `quality` into `[min, max]` and snaps it to the nearest step from `min`.
    pub fn normalize_quality(&self, quality: f32) -> f32 {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        let clamped = quality.clamp(low, high);
        if self.step <= 0.0 {
            return clamped;
        }
        let steps = ((clamped - low) / self.step).round();
        (low + steps * self.step).clamp(low, high)
    }
}

/// Failures while resolving client-side compression parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TuningError {
    /// The host reported no bounds for the requested extension.
    #[error("no compression bounds reported for extension `{0}`")]
    UnknownExtension(String),
}

/// Returns the extensions the host can read; these become the picker filter list.
pub fn readable_extensions(formats: &[SupportedExtension]) -> Vec<String> {
    formats
        .iter()
        .filter(|format| format.readable)
        .map(|format| format.ext.clone())
        .collect()
}

/// Builds [`CompressOptions`] for `extension`, normalizing `quality` against the host bounds.
///
/// # Errors
///
/// Returns [`TuningError::UnknownExtension`] when `contexts` has no entry for `extension`.
pub fn resolve_compress_options(
    contexts: &[CompressOptionsContext],
    extension: &str,
    quality: Option<f32>,
) -> Result<CompressOptions, TuningError> {
    let wanted = extension.trim_start_matches('.');
    let context = contexts
        .iter()
        .find(|context| context.extension.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| TuningError::UnknownExtension(wanted.to_string()))?;
    let quality = context.normalize_quality(quality.unwrap_or(context.default));
    Ok(CompressOptions {
        quality: Some(quality),
        extension: context.extension.clone(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn webp_bounds() -> CompressOptionsContext {
        CompressOptionsContext {
            extension: "webp".to_string(),
            min: 0.0,
            max: 100.0,
            default: 75.0,
            step: 5.0,
        }
    }

    #[test]
    fn readable_extensions_skip_write_only_formats() {
        let formats = vec![
            SupportedExtension {
                ext: "png".to_string(),
                readable: true,
                writable: true,
            },
            SupportedExtension {
                ext: "dds".to_string(),
                readable: false,
                writable: false,
            },
            SupportedExtension {
                ext: "hdr".to_string(),
                readable: true,
                writable: false,
            },
        ];
        assert_eq!(readable_extensions(&formats), vec!["png", "hdr"]);
    }

    #[test]
    fn quality_is_clamped_and_snapped() {
        let bounds = webp_bounds();
        assert_eq!(bounds.normalize_quality(72.0), 70.0);
        assert_eq!(bounds.normalize_quality(140.0), 100.0);
        assert_eq!(bounds.normalize_quality(-3.0), 0.0);
    }

    #[test]
    fn missing_quality_uses_host_default() {
        let options = resolve_compress_options(&[webp_bounds()], ".WEBP", None).expect("known");
        assert_eq!(
            options,
            CompressOptions {
                quality: Some(75.0),
                extension: "webp".to_string(),
            }
        );
    }

    #[test]
    fn unknown_extension_is_reported() {
        assert_eq!(
            resolve_compress_options(&[webp_bounds()], "avif", Some(50.0)),
            Err(TuningError::UnknownExtension("avif".to_string()))
        );
    }
}
