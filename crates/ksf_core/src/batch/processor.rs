//! Batch job list and worker-pool execution.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Local;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigManager, Settings};
use crate::models::{JobStatus, SessionInputs};
use crate::orchestrator::SessionRunner;

use super::{BatchError, BatchResult};

/// Base video extensions picked up from a folder, compared case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];

const CSV_COLUMNS: [&str; 3] = ["base_video", "overlay_video", "overlay_audio"];

/// One batch CSV record. Short rows leave trailing fields empty.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    base_video: String,
    #[serde(default)]
    overlay_video: String,
    #[serde(default)]
    overlay_audio: String,
    #[serde(default)]
    preset: Option<String>,
}

/// What a completed job produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub clip_starts: Vec<f64>,
    pub clips_count: usize,
    pub exports_count: usize,
    pub manifest_path: Option<PathBuf>,
}

/// One (base, overlay) pair to process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// `job_<n>_<HHMMSS>`.
    pub job_id: String,
    pub base_video: PathBuf,
    pub overlay_video: PathBuf,
    pub overlay_audio: PathBuf,
    /// Settings file for this job; the base settings when absent.
    pub preset: Option<PathBuf>,
    /// `<output_root>/<job_id>`; sessions are created under it.
    pub output_dir: PathBuf,
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: Option<JobOutcome>,
}

impl BatchJob {
    fn inputs(&self) -> SessionInputs {
        SessionInputs {
            base_video: self.base_video.clone(),
            overlay_video: self.overlay_video.clone(),
            overlay_audio: self.overlay_audio.clone(),
        }
    }

    fn check_inputs(&self) -> Result<(), String> {
        let inputs = [
            ("Base video", &self.base_video),
            ("Overlay video", &self.overlay_video),
            ("Overlay audio", &self.overlay_audio),
        ];
        for (label, path) in inputs {
            if !path.is_file() {
                return Err(format!("{} not found: {}", label, path.display()));
            }
        }

        if let Some(preset) = &self.preset {
            ConfigManager::load_preset(preset)
                .map_err(|e| format!("Preset {}: {}", preset.display(), e))?;
        }
        Ok(())
    }
}

/// Outcome of [`BatchProcessor::validate_jobs`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchValidation {
    pub valid: usize,
    pub invalid: usize,
    /// `<job_id>: <reason>` per invalid job.
    pub errors: Vec<String>,
}

/// Summary written to `batch_manifest_<YYYYmmdd_HHMMSS>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    /// Failed jobs, including those that failed validation.
    pub failed: usize,
    pub validation: BatchValidation,
    pub jobs: Vec<BatchJob>,
    /// Where the summary was written.
    pub manifest_path: PathBuf,
}

/// Runs many sessions on a bounded worker pool.
///
/// # Example
///
/// ```ignore
/// let mut batch = BatchProcessor::new(settings, "batch_output");
/// batch.load_from_csv(Path::new("jobs.csv"))?;
/// let summary = batch.process_all()?;
/// println!("{} of {} completed", summary.completed, summary.total);
/// ```
pub struct BatchProcessor {
    base_settings: Settings,
    base_preset: Option<PathBuf>,
    output_root: PathBuf,
    max_workers: usize,
    dry_run: bool,
    jobs: Vec<BatchJob>,
}

impl BatchProcessor {
    /// Processor using `base_settings` for jobs without a preset.
    ///
    /// The worker count comes from `[batch] max_workers`.
    pub fn new(base_settings: Settings, output_root: impl Into<PathBuf>) -> Self {
        let max_workers = base_settings.batch.max_workers.max(1);
        Self {
            base_settings,
            base_preset: None,
            output_root: output_root.into(),
            max_workers,
            dry_run: false,
            jobs: Vec::new(),
        }
    }

    /// Preset file given to jobs that don't name their own.
    pub fn with_base_preset(mut self, preset: impl Into<PathBuf>) -> Self {
        self.base_preset = Some(preset.into());
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn jobs(&self) -> &[BatchJob] {
        &self.jobs
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Queue a job and return its id.
    pub fn add_job(
        &mut self,
        base_video: impl Into<PathBuf>,
        overlay_video: impl Into<PathBuf>,
        overlay_audio: impl Into<PathBuf>,
        preset: Option<PathBuf>,
    ) -> String {
        let job_id = format!(
            "job_{}_{}",
            self.jobs.len() + 1,
            Local::now().format("%H%M%S")
        );
        let output_dir = self.output_root.join(&job_id);

        self.jobs.push(BatchJob {
            job_id: job_id.clone(),
            base_video: base_video.into(),
            overlay_video: overlay_video.into(),
            overlay_audio: overlay_audio.into(),
            preset: preset.or_else(|| self.base_preset.clone()),
            output_dir,
            status: JobStatus::Pending,
            error: None,
            result: None,
        });

        job_id
    }

    /// Queue one job per complete CSV row; returns how many were added.
    ///
    /// The header must name `base_video`, `overlay_video` and
    /// `overlay_audio`; `preset` is optional. Rows missing any of the three
    /// inputs are skipped.
    pub fn load_from_csv(&mut self, csv_path: &Path) -> BatchResult<usize> {
        let file = fs::File::open(csv_path).map_err(|e| BatchError::io(csv_path, e))?;
        let csv_error = |e: csv::Error| BatchError::Csv {
            path: csv_path.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);

        let headers = reader.headers().map_err(csv_error)?.clone();
        if let Some(missing) = CSV_COLUMNS
            .iter()
            .find(|name| !headers.iter().any(|h| h == **name))
        {
            return Err(BatchError::Csv {
                path: csv_path.to_path_buf(),
                message: format!("missing column '{}'", missing),
            });
        }

        let mut loaded = 0;
        for (row_no, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(csv_error)?;
            if row.base_video.is_empty()
                || row.overlay_video.is_empty()
                || row.overlay_audio.is_empty()
            {
                tracing::warn!(
                    "Skipping incomplete row {} in {}",
                    row_no + 2,
                    csv_path.display()
                );
                continue;
            }

            let preset = row.preset.filter(|p| !p.is_empty()).map(PathBuf::from);
            self.add_job(row.base_video, row.overlay_video, row.overlay_audio, preset);
            loaded += 1;
        }

        tracing::info!("Loaded {} jobs from {}", loaded, csv_path.display());
        Ok(loaded)
    }

    /// Check every pending job's inputs and preset.
    ///
    /// Invalid jobs are marked `ValidationFailed` with the reason.
    pub fn validate_jobs(&mut self) -> BatchValidation {
        tracing::info!("Validating {} jobs", self.jobs.len());

        let mut validation = BatchValidation::default();
        for job in &mut self.jobs {
            match job.check_inputs() {
                Ok(()) => validation.valid += 1,
                Err(reason) => {
                    tracing::warn!("{}: {}", job.job_id, reason);
                    validation.errors.push(format!("{}: {}", job.job_id, reason));
                    job.status = JobStatus::ValidationFailed;
                    job.error = Some(reason);
                    validation.invalid += 1;
                }
            }
        }

        validation
    }

    /// Settings a job runs with.
    fn settings_for(&self, job: &BatchJob) -> Result<Settings, String> {
        match &job.preset {
            Some(preset) => ConfigManager::load_preset(preset)
                .map_err(|e| format!("Preset {}: {}", preset.display(), e)),
            None => Ok(self.base_settings.clone()),
        }
    }

    /// Run one job to completion.
    fn process_single_job(&self, job: &BatchJob) -> Result<JobOutcome, String> {
        let settings = self.settings_for(job)?;

        let runner = SessionRunner::new(settings)
            .with_dry_run(self.dry_run)
            .with_logs_dir(job.output_dir.join("logs"));

        let outcome = runner
            .run(job.inputs(), &job.output_dir)
            .map_err(|e| e.to_string())?;

        Ok(JobOutcome {
            clip_starts: outcome.clip_starts().to_vec(),
            clips_count: outcome.state.clip_count(),
            exports_count: outcome.state.export_count(),
            manifest_path: outcome.state.manifest_path.clone(),
            session_dir: outcome.paths.session_dir,
            session_id: outcome.session_id,
        })
    }

    /// Validate, run every valid job and write the batch manifest.
    ///
    /// Jobs run on a pool of `max_workers` threads. A job that fails or
    /// panics is marked `Failed`; the others carry on.
    pub fn process_all(&mut self) -> BatchResult<BatchSummary> {
        let validation = self.validate_jobs();
        if validation.invalid > 0 {
            tracing::warn!("{} jobs failed validation", validation.invalid);
        }

        let valid: Vec<usize> = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status != JobStatus::ValidationFailed)
            .map(|(i, _)| i)
            .collect();

        for &i in &valid {
            self.jobs[i].status = JobStatus::Processing;
        }

        let outcomes = if valid.is_empty() {
            Vec::new()
        } else {
            tracing::info!(
                "Processing {} valid jobs with {} workers",
                valid.len(),
                self.max_workers
            );
            self.run_pool(&valid)?
        };

        for (i, outcome) in outcomes {
            let job = &mut self.jobs[i];
            match outcome {
                Ok(result) => {
                    job.status = JobStatus::Completed;
                    job.result = Some(result);
                }
                Err(error) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(error);
                }
            }
        }

        let completed = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .count();
        let failed = self.jobs.len() - completed;

        let manifest_path = self.output_root.join(format!(
            "batch_manifest_{}.json",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let summary = BatchSummary {
            total: self.jobs.len(),
            completed,
            failed,
            validation,
            jobs: self.jobs.clone(),
            manifest_path: manifest_path.clone(),
        };

        fs::create_dir_all(&self.output_root).map_err(|e| BatchError::io(&self.output_root, e))?;
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&manifest_path, json).map_err(|e| BatchError::io(&manifest_path, e))?;

        tracing::info!(
            "Batch complete: {} succeeded, {} failed. Manifest: {}",
            completed,
            failed,
            manifest_path.display()
        );

        Ok(summary)
    }

    /// Run the jobs at `indices` on the worker pool.
    fn run_pool(&self, indices: &[usize]) -> BatchResult<Vec<(usize, Result<JobOutcome, String>)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| BatchError::Pool(e.to_string()))?;

        let total = indices.len();
        let finished = AtomicUsize::new(0);

        let outcomes = pool.install(|| {
            indices
                .par_iter()
                .map(|&i| {
                    let job = &self.jobs[i];
                    tracing::info!("Starting {}: {}", job.job_id, job.base_video.display());

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.process_single_job(job)
                    }))
                    .unwrap_or_else(|_| Err("job panicked".to_string()));

                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    match &outcome {
                        Ok(_) => tracing::info!("[{}/{}] {} completed", done, total, job.job_id),
                        Err(e) => {
                            tracing::warn!("[{}/{}] {} failed: {}", done, total, job.job_id, e)
                        }
                    }

                    (i, outcome)
                })
                .collect()
        });

        Ok(outcomes)
    }
}

/// Video files directly inside `folder`, sorted by path.
///
/// A missing folder yields an empty list.
pub fn discover_videos_in_folder(folder: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read folder {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut videos: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        })
        .collect();

    videos.sort();
    videos
}

/// One job per video in `folder`, all sharing the same overlay pair.
pub fn create_batch_from_folder(
    folder: &Path,
    overlay_video: &Path,
    overlay_audio: &Path,
    preset: Option<PathBuf>,
    settings: Settings,
    output_root: impl Into<PathBuf>,
) -> BatchProcessor {
    let videos = discover_videos_in_folder(folder);
    if videos.is_empty() {
        tracing::warn!("No videos found in {}", folder.display());
    }

    let mut processor = BatchProcessor::new(settings, output_root);
    for video in videos {
        processor.add_job(video, overlay_video, overlay_audio, preset.clone());
    }

    tracing::info!("Created batch with {} jobs", processor.jobs.len());
    processor
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn add_job_assigns_ids_and_dirs() {
        let mut batch = BatchProcessor::new(Settings::default(), "/out");
        let first = batch.add_job("a.mp4", "face.mov", "voice.wav", None);
        let second = batch.add_job("b.mp4", "face.mov", "voice.wav", Some("p.toml".into()));

        assert!(first.starts_with("job_1_"));
        assert!(second.starts_with("job_2_"));
        assert_eq!(batch.jobs()[0].output_dir, Path::new("/out").join(&first));
        assert_eq!(batch.jobs()[0].status, JobStatus::Pending);
        assert_eq!(batch.jobs()[0].preset, None);
        assert_eq!(batch.jobs()[1].preset, Some(PathBuf::from("p.toml")));
    }

    #[test]
    fn base_preset_fills_missing_preset() {
        let mut batch =
            BatchProcessor::new(Settings::default(), "/out").with_base_preset("base.toml");
        batch.add_job("a.mp4", "face.mov", "voice.wav", None);
        assert_eq!(batch.jobs()[0].preset, Some(PathBuf::from("base.toml")));
    }

    #[test]
    fn max_workers_from_settings() {
        let mut settings = Settings::default();
        settings.batch.max_workers = 4;
        assert_eq!(BatchProcessor::new(settings, "/out").max_workers(), 4);
        assert_eq!(
            BatchProcessor::new(Settings::default(), "/out")
                .with_max_workers(0)
                .max_workers(),
            1
        );
    }

    #[test]
    fn csv_rows_become_jobs() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("jobs.csv");
        fs::write(
            &csv,
            "base_video,overlay_video,overlay_audio,preset\n\
             ep1.mp4,face1.mov,voice1.wav,tiktok.toml\n\
             ep2.mp4, face2.mov ,voice2.wav,\n\
             ep3.mp4,,voice3.wav,tiktok.toml\n\
             \n\
             \"ep 4.mp4\",face4.mov,voice4.wav\n",
        )
        .unwrap();

        let mut batch =
            BatchProcessor::new(Settings::default(), dir.path()).with_base_preset("base.toml");
        let loaded = batch.load_from_csv(&csv).unwrap();

        assert_eq!(loaded, 3);
        let jobs = batch.jobs();
        assert_eq!(jobs[0].preset, Some(PathBuf::from("tiktok.toml")));
        assert_eq!(jobs[1].overlay_video, PathBuf::from("face2.mov"));
        assert_eq!(jobs[1].preset, Some(PathBuf::from("base.toml")));
        assert_eq!(jobs[2].base_video, PathBuf::from("ep 4.mp4"));
        assert_eq!(jobs[2].preset, Some(PathBuf::from("base.toml")));
    }

    #[test]
    fn csv_quoted_fields_keep_commas() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("jobs.csv");
        fs::write(
            &csv,
            "base_video,overlay_video,overlay_audio,preset\n\
             \"/v/Live, Part 1.mp4\",/v/face.mp4,/v/voice.wav,\n",
        )
        .unwrap();

        let mut batch = BatchProcessor::new(Settings::default(), dir.path());
        assert_eq!(batch.load_from_csv(&csv).unwrap(), 1);

        let job = &batch.jobs()[0];
        assert_eq!(job.base_video, PathBuf::from("/v/Live, Part 1.mp4"));
        assert_eq!(job.overlay_video, PathBuf::from("/v/face.mp4"));
        assert_eq!(job.overlay_audio, PathBuf::from("/v/voice.wav"));
        assert_eq!(job.preset, None);
    }

    #[test]
    fn csv_columns_may_be_reordered() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("jobs.csv");
        fs::write(&csv, "overlay_audio,base_video,overlay_video\nv.wav,b.mp4,f.mov\n").unwrap();

        let mut batch = BatchProcessor::new(Settings::default(), dir.path());
        assert_eq!(batch.load_from_csv(&csv).unwrap(), 1);
        assert_eq!(batch.jobs()[0].base_video, PathBuf::from("b.mp4"));
        assert_eq!(batch.jobs()[0].overlay_audio, PathBuf::from("v.wav"));
        assert_eq!(batch.jobs()[0].preset, None);
    }

    #[test]
    fn csv_without_required_column_fails() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("jobs.csv");
        fs::write(&csv, "base_video,overlay_video\na.mp4,b.mov\n").unwrap();

        let mut batch = BatchProcessor::new(Settings::default(), dir.path());
        let err = batch.load_from_csv(&csv).unwrap_err();
        assert!(err.to_string().contains("overlay_audio"));
        assert!(batch.jobs().is_empty());
    }

    #[test]
    fn missing_csv_is_io_error() {
        let dir = tempdir().unwrap();
        let mut batch = BatchProcessor::new(Settings::default(), dir.path());
        let err = batch.load_from_csv(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }

    #[test]
    fn validation_marks_bad_jobs() {
        let dir = tempdir().unwrap();
        let (base, face, voice) = (
            dir.path().join("base.mp4"),
            dir.path().join("face.mov"),
            dir.path().join("voice.wav"),
        );
        touch(&base);
        touch(&face);
        touch(&voice);
        let preset = dir.path().join("preset.toml");
        fs::write(&preset, "[slicing]\nclip_len = 30.0\n").unwrap();

        let mut batch = BatchProcessor::new(Settings::default(), dir.path());
        batch.add_job(&base, &face, &voice, Some(preset));
        batch.add_job(&base, &face, dir.path().join("missing.wav"), None);
        batch.add_job(&base, &face, &voice, Some(dir.path().join("missing.toml")));

        let validation = batch.validate_jobs();
        assert_eq!(validation.valid, 1);
        assert_eq!(validation.invalid, 2);
        assert_eq!(validation.errors.len(), 2);

        let jobs = batch.jobs();
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[1].status, JobStatus::ValidationFailed);
        assert!(jobs[1].error.as_deref().unwrap().contains("Overlay audio"));
        assert_eq!(jobs[2].status, JobStatus::ValidationFailed);
        assert!(jobs[2].error.as_deref().unwrap().contains("missing.toml"));
    }

    #[test]
    fn all_invalid_batch_still_writes_manifest() {
        crate::logging::init_test_tracing();
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let mut batch = BatchProcessor::new(Settings::default(), &out);
        batch.add_job("a.mp4", "face.mov", "voice.wav", None);
        batch.add_job("b.mp4", "face.mov", "voice.wav", None);

        let summary = batch.process_all().unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.validation.invalid, 2);
        assert!(summary.manifest_path.exists());

        let name = summary.manifest_path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("batch_manifest_"));
        assert!(name.ends_with(".json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary.manifest_path).unwrap()).unwrap();
        assert_eq!(json["jobs"][0]["status"], "validation_failed");
    }

    #[test]
    fn discovers_videos_case_insensitively() {
        let dir = tempdir().unwrap();
        for name in ["b.MP4", "a.mov", "c.webm", "notes.txt", "d.MkV", "cover.jpg"] {
            touch(&dir.path().join(name));
        }
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let videos = discover_videos_in_folder(dir.path());
        let names: Vec<String> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mov", "b.MP4", "c.webm", "d.MkV"]);
    }

    #[test]
    fn missing_folder_has_no_videos() {
        let dir = tempdir().unwrap();
        assert!(discover_videos_in_folder(&dir.path().join("gone")).is_empty());
    }

    #[test]
    fn folder_batch_shares_overlay() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("ep1.mp4"));
        touch(&dir.path().join("ep2.mov"));

        let batch = create_batch_from_folder(
            dir.path(),
            Path::new("face.mov"),
            Path::new("voice.wav"),
            None,
            Settings::default(),
            dir.path().join("out"),
        );

        assert_eq!(batch.jobs().len(), 2);
        assert!(batch
            .jobs()
            .iter()
            .all(|j| j.overlay_audio == Path::new("voice.wav")));
        assert!(batch.jobs()[0].base_video.ends_with("ep1.mp4"));
    }
}
