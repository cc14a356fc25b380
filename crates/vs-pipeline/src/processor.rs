//! The [`Processor`]: entry point for processing one video.

use std::path::Path;
use std::time::Instant;

use vs_av::{ToolRegistry, Workspace};
use vs_core::config::{Config, LimitsConfig};
use vs_core::paths::display_name;
use vs_core::{ProcessingOptions, StorageLayout};

use crate::context::{ProgressTracker, Services};
use crate::executor::PipelineExecutor;
use crate::factory::create_stages;
use crate::naming::generate_output_name;
use crate::report::RunReport;
use crate::stage::Stage;

const FINALIZE: &str = "Finalize";

/// Runs the pipeline against the storage layout it was built with.
///
/// A processor owns the tool registry, the color profile cache, and the
/// frame worker pool. Runs on one processor may overlap; their scratch files
/// are namespaced by the random output name.
#[derive(Debug)]
pub struct Processor {
    services: Services,
    layout: StorageLayout,
}

impl Processor {
    /// Build a processor from configuration, discovering tools on `PATH`.
    pub fn new(config: &Config) -> vs_core::Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        Self::with_parts(tools, StorageLayout::from_config(&config.paths), config.limits.clone())
    }

    pub fn with_parts(
        tools: ToolRegistry,
        layout: StorageLayout,
        limits: LimitsConfig,
    ) -> vs_core::Result<Self> {
        Ok(Self {
            services: Services::new(tools, limits)?,
            layout,
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Process `input` with the stages enabled in `options`.
    ///
    /// `on_progress` receives `(label, overall_percent, step_index,
    /// total_steps)`. On success the output is in the layout's output
    /// directory under a freshly generated name; on failure no scratch files
    /// of the run remain.
    pub async fn run(
        &self,
        input: &Path,
        options: &ProcessingOptions,
        on_progress: &(dyn Fn(&str, f64, usize, usize) + Send + Sync + '_),
    ) -> vs_core::Result<RunReport> {
        options.validate()?;
        self.run_with_stages(input, create_stages(options), on_progress)
            .await
    }

    /// Process `input` with an explicit stage list, followed by the finalize
    /// copy.
    pub async fn run_with_stages(
        &self,
        input: &Path,
        stages: Vec<Box<dyn Stage>>,
        on_progress: &(dyn Fn(&str, f64, usize, usize) + Send + Sync + '_),
    ) -> vs_core::Result<RunReport> {
        if !input.is_file() {
            return Err(vs_core::Error::Validation(format!(
                "input file not found: {}",
                input.display()
            )));
        }

        let started = Instant::now();
        let original_name = display_name(input);
        let executor = PipelineExecutor::new(stages);
        let tracker = ProgressTracker::new(on_progress, executor.len() + 1);

        let output_name = generate_output_name();
        tracing::info!(
            "Processing {original_name} -> {output_name} ({} stages: {})",
            executor.len(),
            executor.stage_names().join(", ")
        );

        let mut workspace = Workspace::new(self.layout.temp_dir(), input, &output_name)?;
        let stages = executor
            .execute(&mut workspace, &self.services, &original_name, &tracker)
            .await?;

        tracker.report("Finalizing", 0.5);
        let output_path = workspace
            .finalize(self.layout.output_dir())
            .map_err(|e| e.into_stage_failure(FINALIZE, &original_name))?;
        tracker.complete("Processing complete");

        let elapsed_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            "[100%] {original_name} -> {} in {elapsed_secs:.1}s",
            output_path.display()
        );

        Ok(RunReport {
            input: input.to_path_buf(),
            original_name,
            output_path,
            output_name,
            stages,
            elapsed_secs,
            finished_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageContext;
    use crate::naming::is_generated_name;
    use crate::stage::StageOutcome;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn make_processor(root: &Path) -> Processor {
        let tools = ToolRegistry::from_paths("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let limits = LimitsConfig {
            max_workers: Some(1),
            ..Default::default()
        };
        Processor::with_parts(tools, StorageLayout::under(root), limits).unwrap()
    }

    struct Reverse;

    #[async_trait]
    impl Stage for Reverse {
        fn name(&self) -> &'static str {
            "Reverse"
        }
        fn label(&self) -> &'static str {
            "Reversing"
        }
        fn done_label(&self) -> &'static str {
            "Reversed"
        }
        async fn validate(&self, _services: &Services) -> vs_core::Result<()> {
            Ok(())
        }
        async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
            let mut bytes = std::fs::read(ctx.input)?;
            bytes.reverse();
            std::fs::write(ctx.output, bytes)?;
            Ok(StageOutcome::Completed)
        }
    }

    struct Broken;

    #[async_trait]
    impl Stage for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }
        fn label(&self) -> &'static str {
            "Breaking"
        }
        fn done_label(&self) -> &'static str {
            "Broke"
        }
        async fn validate(&self, _services: &Services) -> vs_core::Result<()> {
            Ok(())
        }
        async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
            std::fs::write(ctx.output, b"half")?;
            Err(vs_core::Error::tool("ffmpeg", "Error while decoding stream"))
        }
    }

    fn write_input(root: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let input = root.join(name);
        std::fs::write(&input, bytes).unwrap();
        input
    }

    #[tokio::test]
    async fn runs_stages_then_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let processor = make_processor(dir.path());
        let input = write_input(dir.path(), "beach_day.mp4", b"abc");

        let seen: Arc<Mutex<Vec<(String, f64, usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_progress = move |label: &str, pct: f64, step: usize, total: usize| {
            sink.lock().unwrap().push((label.to_string(), pct, step, total));
        };

        let report = processor
            .run_with_stages(&input, vec![Box::new(Reverse)], &on_progress)
            .await
            .unwrap();

        assert!(is_generated_name(&report.output_name));
        assert!(!report.output_name.contains("beach"));
        assert_eq!(report.original_name, "beach_day.mp4");
        assert_eq!(report.output_path, dir.path().join("output").join(&report.output_name));
        assert_eq!(std::fs::read(&report.output_path).unwrap(), b"cba");
        assert_eq!(std::fs::read(&input).unwrap(), b"abc");
        assert_eq!(report.stages.len(), 1);

        // Scratch artifacts are gone; the scratch dir itself may remain.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("temp")).unwrap().collect();
        assert!(leftovers.is_empty());

        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.0, "Processing complete");
        assert_eq!(last.1, 100.0);
        assert_eq!((last.2, last.3), (2, 2));
        assert!(seen.iter().any(|r| r.0 == "Finalizing" && r.1 == 75.0));
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[tokio::test]
    async fn no_stages_still_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let processor = make_processor(dir.path());
        let input = write_input(dir.path(), "clip.mov", b"untouched");

        let report = processor
            .run_with_stages(&input, Vec::new(), &|_, _, _, _| {})
            .await
            .unwrap();
        assert_eq!(std::fs::read(&report.output_path).unwrap(), b"untouched");
        assert!(report.stages.is_empty());
    }

    #[tokio::test]
    async fn failure_leaves_no_scratch_or_output() {
        let dir = tempfile::tempdir().unwrap();
        let processor = make_processor(dir.path());
        let input = write_input(dir.path(), "clip.mp4", b"abc");

        let err = processor
            .run_with_stages(&input, vec![Box::new(Reverse), Box::new(Broken)], &|_, _, _, _| {})
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Stage 'Broken' failed for clip.mp4: Error while decoding stream"
        );
        let scratch: Vec<_> = std::fs::read_dir(dir.path().join("temp")).unwrap().collect();
        assert!(scratch.is_empty());
        assert!(!dir.path().join("output").exists());
    }

    #[tokio::test]
    async fn missing_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let processor = make_processor(dir.path());
        let err = processor
            .run(
                &dir.path().join("nope.mp4"),
                &ProcessingOptions::default(),
                &|_, _, _, _| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, vs_core::Error::Validation(_)));
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let processor = make_processor(dir.path());
        let input = write_input(dir.path(), "clip.mp4", b"abc");
        let options = ProcessingOptions {
            crf_value: 99,
            ..Default::default()
        };

        let err = processor
            .run(&input, &options, &|_, _, _, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, vs_core::Error::Validation(_)));
        assert!(!dir.path().join("temp").exists());
    }
}
