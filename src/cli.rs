use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vs_core::ProcessingOptions;

#[derive(Parser)]
#[command(name = "vidshift")]
#[command(
    author,
    version,
    about = "Re-fingerprint videos so they look the same but hash differently"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a single file through the pipeline
    Run {
        /// Input video to process
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        processing: ProcessingArgs,

        /// Compare the output with the input once processing finishes
        #[arg(long)]
        verify: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process every video in a directory, one file at a time
    Batch {
        /// Directory to scan recursively for videos
        #[arg(required = true)]
        input_dir: PathBuf,

        #[command(flatten)]
        processing: ProcessingArgs,

        /// Write outputs here instead of the configured output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// List the files that would be processed and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare an original video with a processed one
    Verify {
        /// The original video
        #[arg(required = true)]
        original: PathBuf,

        /// The processed video
        #[arg(required = true)]
        processed: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify the newest output against its best-guess original
    VerifyLast {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Delete stale scratch files and verification copies
    Sweep,

    /// Validate configuration file
    Validate,

    /// Show version information
    Version,
}

/// Stage switches and parameters shared by `run` and `batch`.
///
/// Anything left unset keeps the value from the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ProcessingArgs {
    /// Keep container and stream metadata
    #[arg(long)]
    pub no_metadata: bool,

    /// Skip per-frame noise
    #[arg(long)]
    pub no_noise: bool,

    /// Skip the final re-encode
    #[arg(long)]
    pub no_reencode: bool,

    /// Splice a short silence into the audio track
    #[arg(long)]
    pub silence: bool,

    /// Burn a near-invisible overlay into the video
    #[arg(long)]
    pub overlay: bool,

    /// Noise intensity (1-5)
    #[arg(long)]
    pub noise_intensity: Option<u8>,

    /// CRF for the re-encode (18-35)
    #[arg(long)]
    pub crf: Option<u8>,

    /// Seconds of silence to add
    #[arg(long)]
    pub silence_duration: Option<f64>,
}

impl ProcessingArgs {
    /// Layer these flags over `base`.
    pub fn apply(&self, base: &ProcessingOptions) -> ProcessingOptions {
        let mut options = base.clone();
        if self.no_metadata {
            options.strip_metadata = false;
        }
        if self.no_noise {
            options.add_noise = false;
        }
        if self.no_reencode {
            options.re_encode = false;
        }
        if self.silence {
            options.add_silence = true;
        }
        if self.overlay {
            options.add_overlay = true;
        }
        if let Some(intensity) = self.noise_intensity {
            options.noise_intensity = intensity;
        }
        if let Some(crf) = self.crf {
            options.crf_value = crf;
        }
        if let Some(duration) = self.silence_duration {
            options.silence_duration = duration;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let base = ProcessingOptions {
            add_silence: true,
            crf_value: 30,
            ..Default::default()
        };
        assert_eq!(ProcessingArgs::default().apply(&base), base);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "vidshift",
            "batch",
            "in",
            "--no-noise",
            "--overlay",
            "--crf",
            "22",
            "--silence-duration",
            "0.5",
        ]);
        let Commands::Batch { processing, .. } = cli.command else {
            panic!("expected batch");
        };
        let options = processing.apply(&ProcessingOptions::default());
        assert!(!options.add_noise);
        assert!(options.add_overlay);
        assert!(options.strip_metadata);
        assert_eq!(options.crf_value, 22);
        assert_eq!(options.silence_duration, 0.5);
    }
}
