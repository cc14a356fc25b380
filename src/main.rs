mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ProcessingArgs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use vs_av::ToolRegistry;
use vs_core::config::Config;
use vs_core::StorageLayout;
use vs_pipeline::intake::stage_upload;
use vs_pipeline::{find_video_files, BatchRunner, BatchSummary, Processor};
use vs_verify::{FingerprintVerifier, VerificationReport};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidshift=trace,vs_pipeline=trace,vs_av=debug,vs_verify=debug,vs_noise=debug,vs_core=debug"
                .to_string()
        } else {
            "vidshift=info,vs_pipeline=info,vs_av=info,vs_verify=info,vs_noise=info,vs_core=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            input,
            processing,
            verify,
            json,
        } => {
            let config = load_and_sweep(config_path)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, &config, &processing, verify, json))
        }
        Commands::Batch {
            input_dir,
            processing,
            output_dir,
            dry_run,
        } => {
            let mut config = load_and_sweep(config_path)?;
            if let Some(dir) = output_dir {
                config.paths.output_dir = dir;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(&input_dir, &config, &processing, dry_run))
        }
        Commands::Verify {
            original,
            processed,
            json,
        } => {
            let config = config::load_config_or_default(config_path)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(verify_files(&original, &processed, &config, json))
        }
        Commands::VerifyLast { json } => {
            let config = load_and_sweep(config_path)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(verify_last(&config, json))
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(config_path)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(&config))
        }
        Commands::Sweep => {
            let config = config::load_config_or_default(config_path)?;
            sweep(&config)
        }
        Commands::Validate => validate_config(config_path),
        Commands::Version => {
            println!("vidshift {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load config and, when enabled, clear stale scratch files before work starts.
fn load_and_sweep(config_path: Option<&Path>) -> Result<Config> {
    let config = config::load_config_or_default(config_path)?;
    if config.hygiene.sweep_on_startup {
        let stats = StorageLayout::from_config(&config.paths).sweep_stale(&config.hygiene);
        if stats.removed > 0 || stats.failed > 0 {
            tracing::info!(
                "Startup sweep removed {} stale files ({} failed)",
                stats.removed,
                stats.failed
            );
        }
    }
    Ok(config)
}

/// Progress printer that writes one line per new label.
fn label_printer(prefix: String) -> impl Fn(&str, f64, usize, usize) + Send + Sync {
    let last = Mutex::new(String::new());
    move |label: &str, pct: f64, step: usize, total: usize| {
        let mut last = match last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last != label {
            eprintln!("{prefix}[{pct:>5.1}%] ({step}/{total}) {label}");
            *last = label.to_string();
        }
    }
}

async fn run_file(
    input: &Path,
    config: &Config,
    processing: &ProcessingArgs,
    verify: bool,
    json: bool,
) -> Result<()> {
    let options = processing.apply(&config.processing);
    let processor = Processor::new(config)?;

    let upload = stage_upload(processor.layout(), input, &config.intake)
        .with_context(|| format!("Rejected input {:?}", input))?;

    let on_progress = label_printer(String::new());
    let outcome: vs_core::Result<_> = async {
        let report = processor.run(&upload.staged, &options, &on_progress).await?;
        let verification = if verify {
            let verifier = FingerprintVerifier::new(processor.services().tools.clone());
            Some(verifier.verify_run(&report).await?)
        } else {
            None
        };
        Ok((report, verification))
    }
    .await;

    // The verification copy stays behind for `verify-last`.
    if let Err(e) = std::fs::remove_file(&upload.staged) {
        tracing::warn!("Failed to remove staged input {:?}: {}", upload.staged, e);
    }

    let (report, verification) =
        outcome.with_context(|| format!("Processing failed for {}", upload.original_name))?;

    if json {
        let value = serde_json::json!({
            "run": report,
            "verification": verification,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("\nProcessing complete!");
    println!("Input:  {}", upload.original_name);
    println!("Output: {}", report.output_path.display());
    println!("Time:   {:.1}s", report.elapsed_secs);
    for stage in &report.stages {
        match &stage.outcome {
            vs_pipeline::StageOutcome::Completed => {
                println!("  ✓ {} ({:.1}s)", stage.name, stage.elapsed_secs)
            }
            vs_pipeline::StageOutcome::Skipped { reason } => {
                println!("  - {} skipped: {}", stage.name, reason)
            }
        }
    }

    if let Some(verification) = verification {
        println!();
        print_verification(&verification);
    }

    Ok(())
}

async fn run_batch(
    input_dir: &Path,
    config: &Config,
    processing: &ProcessingArgs,
    dry_run: bool,
) -> Result<()> {
    let options = processing.apply(&config.processing);
    options.validate()?;

    let files = find_video_files(input_dir)?;
    if files.is_empty() {
        println!("No video files found in {:?}", input_dir);
        return Ok(());
    }

    println!("Found {} video files in {:?}", files.len(), input_dir);
    println!(
        "Stages: {}",
        vs_pipeline::create_stages(&options)
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" → ")
    );

    if dry_run {
        for file in &files {
            println!("  {}", file.display());
        }
        println!("\n[DRY RUN] Would process {} files", files.len());
        return Ok(());
    }

    let processor = Processor::new(config)?;
    let runner = BatchRunner::new(&processor, options);

    let total = files.len();
    let printers: Vec<_> = (0..total)
        .map(|i| label_printer(format!("[{}/{total}] ", i + 1)))
        .collect();
    let on_progress = |index: usize, label: &str, pct: f64, step: usize, steps: usize| {
        if let Some(print) = printers.get(index) {
            print(label, pct, step, steps);
        }
    };

    let items = runner.run(&files, &on_progress).await;

    println!();
    for item in &items {
        println!("{}", item.message);
    }

    let summary = BatchSummary::from_items(&items);
    println!("\nSuccessful: {}", summary.succeeded);
    println!("Errors: {}", summary.failed);
    println!(
        "Time: {:.1}s total, {:.1}s per file",
        summary.total_secs, summary.average_secs
    );
    println!("Output directory: {}", processor.layout().output_dir().display());

    if summary.failed > 0 {
        anyhow::bail!("{} of {} files failed", summary.failed, summary.total);
    }
    Ok(())
}

fn verifier_for(config: &Config) -> FingerprintVerifier {
    FingerprintVerifier::new(Arc::new(ToolRegistry::discover(&config.tools)))
}

async fn verify_files(
    original: &Path,
    processed: &Path,
    config: &Config,
    json: bool,
) -> Result<()> {
    let report = verifier_for(config).compare(original, processed).await?;
    output_verification(&report, json)
}

async fn verify_last(config: &Config, json: bool) -> Result<()> {
    let layout = StorageLayout::from_config(&config.paths);
    match verifier_for(config)
        .auto_verify_last_processed(&layout)
        .await?
    {
        Some(report) => output_verification(&report, json),
        None => {
            println!(
                "No processed video found in {}",
                layout.output_dir().display()
            );
            Ok(())
        }
    }
}

fn output_verification(report: &VerificationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_verification(report);
    }
    Ok(())
}

fn print_verification(report: &VerificationReport) {
    println!("Original:  {} ({})", report.original_name, report.original_hash);
    println!("Processed: {} ({})", report.processed_name, report.processed_hash);
    println!(
        "  {}x{} {:.2}s → {}x{} {:.2}s",
        report.original_stats.width,
        report.original_stats.height,
        report.original_stats.duration,
        report.processed_stats.width,
        report.processed_stats.height,
        report.processed_stats.duration
    );

    let changed = report.flags.changed();
    if changed.is_empty() {
        println!("Changed: nothing");
    } else {
        println!("Changed: {}", changed.join(", "));
    }

    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    println!(
        "{} Fingerprint changed",
        mark(report.fingerprint_changed())
    );
    println!(
        "{} Resolution and duration preserved",
        mark(report.structure_preserved())
    );

    if let Some(ref warning) = report.verification_warning {
        println!("⚠ {}", warning);
    }
}

async fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let registry = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in registry.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!(
            "H.264 encoder: {}",
            registry.video_encoder().await.codec_name()
        );
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg and ffprobe to process videos.");
    }

    Ok(())
}

fn sweep(config: &Config) -> Result<()> {
    let layout = StorageLayout::from_config(&config.paths);
    let stats = layout.sweep_stale(&config.hygiene);
    println!(
        "Removed {} stale files from {} and {}",
        stats.removed,
        layout.temp_dir().display(),
        layout.input_dir().display()
    );
    if stats.failed > 0 {
        println!("{} files could not be removed", stats.failed);
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("⚠ Configuration has {} warnings:", warnings.len());
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    let p = &config.processing;
    println!("  Input dir:  {}", config.paths.input_dir.display());
    println!("  Output dir: {}", config.paths.output_dir.display());
    println!("  Temp dir:   {}", config.paths.temp_dir.display());
    println!("  Strip metadata: {}", p.strip_metadata);
    println!("  Noise: {} (intensity {})", p.add_noise, p.noise_intensity);
    println!("  Re-encode: {} (crf {})", p.re_encode, p.crf_value);
    println!("  Silence: {} ({}s)", p.add_silence, p.silence_duration);
    println!("  Overlay: {}", p.add_overlay);
    println!(
        "  Stage timeout: {}s, encode timeout: {}s",
        config.limits.stage_timeout_secs, config.limits.encode_timeout_secs
    );

    Ok(())
}
