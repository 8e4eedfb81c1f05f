//! `ksf` - Keo Shortform Factory command-line front-end.
//!
//! Usage:
//!   ksf run --base ep1.mp4 --overlay-video face.mov --overlay-audio voice.wav --out shorts
//!   ksf run ... --dry-run
//!   ksf batch --csv jobs.csv --out batch_output --workers 4

mod cli;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use ksf_core::batch::{create_batch_from_folder, BatchProcessor, BatchSummary};
use ksf_core::config::Settings;
use ksf_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use ksf_core::models::{JobStatus, SessionInputs};
use ksf_core::orchestrator::{SessionOutcome, SessionRunner};

use cli::{BatchArgs, Cli, Command, RunArgs, SettingsArgs};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    match cli.command {
        Command::Run(args) => run(args, level),
        Command::Batch(args) => batch(args, level),
    }
}

/// Load settings, then start tracing into the configured logs folder.
///
/// An unusable logs folder downgrades to stderr-only tracing.
fn setup(
    args: &SettingsArgs,
    level: LogLevel,
) -> anyhow::Result<(Settings, Option<WorkerGuard>)> {
    let settings = args.load()?;
    let logs_dir = PathBuf::from(&settings.paths.logs_folder);
    let guard = match init_tracing_with_file(level, &logs_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_tracing(level);
            tracing::warn!(
                "Cannot write logs to {} ({}), logging to stderr only",
                logs_dir.display(),
                e
            );
            None
        }
    };

    if let Some(preset) = args.missing_preset() {
        tracing::warn!("Preset {} not found, using defaults", preset.display());
    }

    Ok((settings, guard))
}

fn run(args: RunArgs, level: LogLevel) -> anyhow::Result<()> {
    let (mut settings, _guard) = setup(&args.settings, level)?;
    args.apply_overrides(&mut settings)?;

    let inputs = SessionInputs {
        base_video: args.base.clone(),
        overlay_video: args.overlay_video.clone(),
        overlay_audio: args.overlay_audio.clone(),
    };

    let runner = SessionRunner::new(settings)
        .with_dry_run(args.dry_run)
        .with_manifest(!args.no_manifest)
        .with_log_level(level);

    let outcome = runner
        .run_with_callbacks(
            inputs,
            &args.out,
            Some(Box::new(|line: &str| println!("{}", line))),
            None,
        )
        .context("Session failed")?;

    if outcome.dry_run {
        print_plan(&outcome, runner.settings(), &args.base);
    } else {
        print_session(&outcome);
    }
    Ok(())
}

fn print_plan(outcome: &SessionOutcome, settings: &Settings, base: &Path) {
    println!();
    println!("Dry run plan for {}:", base.display());
    println!("  Output dir: {}", outcome.paths.session_dir.display());
    println!(
        "  Config: {}s clips, {}s stride, {} ratio",
        settings.slicing.clip_len, settings.slicing.stride, settings.export.ratio
    );
    println!(
        "  Overlay: {}, {} opacity",
        settings.overlay.position, settings.overlay.opacity
    );

    let starts = outcome.clip_starts();
    if starts.is_empty() {
        println!("  No clips: the source is shorter than one clip");
        return;
    }
    println!("  {} clips:", starts.len());
    for (i, start) in starts.iter().enumerate() {
        println!(
            "    {:>3}. {:>9.2}s - {:>9.2}s",
            i + 1,
            start,
            start + settings.slicing.clip_len
        );
    }
}

fn print_session(outcome: &SessionOutcome) {
    let state = &outcome.state;
    println!();
    println!("Session {} complete", outcome.session_id);
    if let Some(alignment) = &state.alignment {
        println!(
            "  Alignment: {} (offset {:+.3}s, confidence {:.3})",
            alignment.status, alignment.original_offset, alignment.confidence
        );
    }
    println!(
        "  Clips: {} in {}",
        state.clip_count(),
        outcome.paths.clips_src.display()
    );
    println!(
        "  Exports: {} in {}",
        state.export_count(),
        outcome.paths.exports.display()
    );
    if let Some(manifest) = &state.manifest_path {
        println!("  Manifest: {}", manifest.display());
    }
}

fn batch(args: BatchArgs, level: LogLevel) -> anyhow::Result<()> {
    let (settings, _guard) = setup(&args.settings, level)?;
    let preset = args.settings.existing_preset().map(Path::to_path_buf);

    let mut processor = match (&args.csv, &args.folder) {
        (Some(csv), _) => {
            let mut processor = BatchProcessor::new(settings, &args.out);
            if let Some(preset) = &preset {
                processor = processor.with_base_preset(preset);
            }
            let loaded = processor.load_from_csv(csv)?;
            println!("Loaded {} jobs from {}", loaded, csv.display());
            processor
        }
        (None, Some(folder)) => {
            let (Some(overlay_video), Some(overlay_audio)) =
                (&args.overlay_video, &args.overlay_audio)
            else {
                anyhow::bail!("--folder needs --overlay-video and --overlay-audio");
            };
            create_batch_from_folder(
                folder,
                overlay_video,
                overlay_audio,
                preset,
                settings,
                &args.out,
            )
        }
        (None, None) => anyhow::bail!("Either --csv or --folder is required"),
    };

    if let Some(workers) = args.workers {
        processor = processor.with_max_workers(workers);
    }
    processor = processor.with_dry_run(args.dry_run);

    if processor.jobs().is_empty() {
        println!("No jobs to process");
        return Ok(());
    }

    println!(
        "Processing {} jobs with {} workers",
        processor.jobs().len(),
        processor.max_workers()
    );
    let summary = processor.process_all().context("Batch failed")?;
    print_batch(&summary);
    Ok(())
}

fn print_batch(summary: &BatchSummary) {
    println!();
    println!(
        "Batch complete: {} succeeded, {} failed",
        summary.completed, summary.failed
    );
    for job in &summary.jobs {
        match (&job.status, &job.error) {
            (JobStatus::Completed, _) => {
                let clips = job.result.as_ref().map(|r| r.clips_count).unwrap_or(0);
                println!("  [OK] {} ({} clips)", job.job_id, clips);
            }
            (status, error) => println!(
                "  [{}] {}: {}",
                status,
                job.job_id,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!("Manifest: {}", summary.manifest_path.display());
}
