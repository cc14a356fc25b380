//! Per-run processing options.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Valid range for [`ProcessingOptions::noise_intensity`].
pub const NOISE_INTENSITY_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Valid range for [`ProcessingOptions::crf_value`].
pub const CRF_RANGE: std::ops::RangeInclusive<u8> = 18..=35;

/// Which fingerprint-altering stages to run, and their parameters.
///
/// Stage order is fixed regardless of which flags are set:
/// metadata strip, noise, re-encode, silence pad, overlay, then the
/// finalize copy which always runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub strip_metadata: bool,
    pub add_noise: bool,
    pub noise_intensity: u8,
    pub re_encode: bool,
    pub crf_value: u8,
    pub add_silence: bool,
    /// Seconds of silence to splice into the audio track.
    pub silence_duration: f64,
    pub add_overlay: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            strip_metadata: true,
            add_noise: true,
            noise_intensity: 2,
            re_encode: true,
            crf_value: 27,
            add_silence: false,
            silence_duration: 0.2,
            add_overlay: false,
        }
    }
}

impl ProcessingOptions {
    /// Check parameter ranges.
    ///
    /// Parameters of disabled stages are still checked so that a config file
    /// with a bad value is reported even while the stage is switched off.
    pub fn validate(&self) -> Result<()> {
        if !NOISE_INTENSITY_RANGE.contains(&self.noise_intensity) {
            return Err(Error::Validation(format!(
                "noise_intensity must be within {}..={}, got {}",
                NOISE_INTENSITY_RANGE.start(),
                NOISE_INTENSITY_RANGE.end(),
                self.noise_intensity
            )));
        }
        if !CRF_RANGE.contains(&self.crf_value) {
            return Err(Error::Validation(format!(
                "crf_value must be within {}..={}, got {}",
                CRF_RANGE.start(),
                CRF_RANGE.end(),
                self.crf_value
            )));
        }
        if !(self.silence_duration.is_finite() && self.silence_duration > 0.0) {
            return Err(Error::Validation(format!(
                "silence_duration must be a positive number of seconds, got {}",
                self.silence_duration
            )));
        }
        Ok(())
    }

    /// Number of optional stages switched on.
    pub fn enabled_stage_count(&self) -> usize {
        [
            self.strip_metadata,
            self.add_noise,
            self.re_encode,
            self.add_silence,
            self.add_overlay,
        ]
        .iter()
        .filter(|enabled| **enabled)
        .count()
    }

    /// Total progress steps for a run: enabled stages plus the finalize copy.
    pub fn total_steps(&self) -> usize {
        self.enabled_stage_count() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_batch_defaults() {
        let opts = ProcessingOptions::default();
        assert!(opts.strip_metadata);
        assert!(opts.add_noise);
        assert!(opts.re_encode);
        assert!(!opts.add_silence);
        assert!(!opts.add_overlay);
        assert_eq!(opts.noise_intensity, 2);
        assert_eq!(opts.crf_value, 27);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn total_steps_counts_finalize() {
        let none = ProcessingOptions {
            strip_metadata: false,
            add_noise: false,
            re_encode: false,
            ..Default::default()
        };
        assert_eq!(none.total_steps(), 1);

        let all = ProcessingOptions {
            add_silence: true,
            add_overlay: true,
            ..Default::default()
        };
        assert_eq!(all.total_steps(), 6);
    }

    #[test]
    fn rejects_out_of_range_intensity() {
        for bad in [0, 6] {
            let opts = ProcessingOptions {
                noise_intensity: bad,
                ..Default::default()
            };
            assert!(matches!(opts.validate(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn rejects_out_of_range_crf() {
        for bad in [17, 36] {
            let opts = ProcessingOptions {
                crf_value: bad,
                ..Default::default()
            };
            assert!(opts.validate().is_err());
        }
    }

    #[test]
    fn rejects_non_positive_silence() {
        for bad in [0.0, -1.0, f64::NAN] {
            let opts = ProcessingOptions {
                silence_duration: bad,
                ..Default::default()
            };
            assert!(opts.validate().is_err());
        }
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let opts: ProcessingOptions = toml::from_str("add_overlay = true\ncrf_value = 23").unwrap();
        assert!(opts.add_overlay);
        assert_eq!(opts.crf_value, 23);
        assert_eq!(opts.noise_intensity, 2);
    }
}
