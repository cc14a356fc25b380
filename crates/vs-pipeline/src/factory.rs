//! Stage factory: build the stage list for a set of [`ProcessingOptions`].

use vs_core::ProcessingOptions;

use crate::stage::Stage;
use crate::stages::{NoiseStage, OverlayStage, ReEncodeStage, SilenceStage, StripMetadataStage};

/// Create the enabled stages in their fixed order: metadata strip, noise,
/// re-encode, silence, overlay.
///
/// Finalization is not a stage; the processor always performs it.
pub fn create_stages(options: &ProcessingOptions) -> Vec<Box<dyn Stage>> {
    let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(options.enabled_stage_count());

    if options.strip_metadata {
        stages.push(Box::new(StripMetadataStage));
    }
    if options.add_noise {
        stages.push(Box::new(NoiseStage::new(options.noise_intensity)));
    }
    if options.re_encode {
        stages.push(Box::new(ReEncodeStage::new(options.crf_value)));
    }
    if options.add_silence {
        stages.push(Box::new(SilenceStage::new(options.silence_duration)));
    }
    if options.add_overlay {
        stages.push(Box::new(OverlayStage));
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(options: &ProcessingOptions) -> Vec<&'static str> {
        create_stages(options).iter().map(|s| s.name()).collect()
    }

    #[test]
    fn default_options() {
        assert_eq!(
            names(&ProcessingOptions::default()),
            vec!["Strip metadata", "Add noise", "Re-encode"]
        );
    }

    #[test]
    fn all_enabled_keeps_fixed_order() {
        let options = ProcessingOptions {
            add_silence: true,
            add_overlay: true,
            ..Default::default()
        };
        assert_eq!(
            names(&options),
            vec!["Strip metadata", "Add noise", "Re-encode", "Add silence", "Add overlay"]
        );
    }

    #[test]
    fn none_enabled() {
        let options = ProcessingOptions {
            strip_metadata: false,
            add_noise: false,
            re_encode: false,
            ..Default::default()
        };
        assert!(create_stages(&options).is_empty());
        assert_eq!(options.total_steps(), 1);
    }

    #[test]
    fn stage_count_matches_options() {
        let options = ProcessingOptions {
            add_noise: false,
            add_overlay: true,
            ..Default::default()
        };
        assert_eq!(create_stages(&options).len(), options.enabled_stage_count());
        assert_eq!(names(&options), vec!["Strip metadata", "Re-encode", "Add overlay"]);
    }
}
