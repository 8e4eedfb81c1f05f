//! Command-line arguments and how they map onto settings.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::{ArgGroup, Args, Parser, Subcommand};

use ksf_core::config::{ConfigManager, Settings};
use ksf_core::models::{AspectRatio, OverlayPosition};

/// Keo Shortform Factory: long-form video plus overlay in, vertical clips out.
#[derive(Parser, Debug)]
#[command(name = "ksf", version, about)]
pub struct Cli {
    /// Log debug output.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process one base video with its overlay.
    Run(RunArgs),
    /// Process many base videos from a CSV file or a folder.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Long-form base video.
    #[arg(long, short = 'b')]
    pub base: PathBuf,

    /// Overlay (face) video.
    #[arg(long)]
    pub overlay_video: PathBuf,

    /// Overlay audio that replaces the base audio.
    #[arg(long)]
    pub overlay_audio: PathBuf,

    /// Root folder sessions are created under.
    #[arg(long, short = 'o')]
    pub out: PathBuf,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Clip length in seconds.
    #[arg(long, short = 'l')]
    pub clip_len: Option<f64>,

    /// Distance between clip starts, in seconds.
    #[arg(long, short = 's')]
    pub clip_stride: Option<f64>,

    /// Snap clips to scene boundaries.
    #[arg(long)]
    pub scene_detect: bool,

    /// Pull clips toward audio hooks.
    #[arg(long)]
    pub hook_detect: bool,

    /// Minimum alignment confidence.
    #[arg(long, short = 'c')]
    pub min_conf: Option<f64>,

    /// Export aspect ratio, W:H.
    #[arg(long, short = 'r')]
    pub ratio: Option<AspectRatio>,

    /// Overlay position: a corner, center or x,y.
    #[arg(long)]
    pub position: Option<OverlayPosition>,

    /// Overlay opacity in [0, 1].
    #[arg(long)]
    pub opacity: Option<f64>,

    /// Cap on the number of clips.
    #[arg(long)]
    pub max_clips: Option<usize>,

    /// Probe and plan only; no media is written.
    #[arg(long)]
    pub dry_run: bool,

    /// Don't write manifest.json.
    #[arg(long)]
    pub no_manifest: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["csv", "folder"])))]
pub struct BatchArgs {
    /// CSV with base_video,overlay_video,overlay_audio,preset columns.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Folder of base videos sharing one overlay.
    #[arg(long, requires_all = ["overlay_video", "overlay_audio"])]
    pub folder: Option<PathBuf>,

    /// Overlay video for --folder.
    #[arg(long)]
    pub overlay_video: Option<PathBuf>,

    /// Overlay audio for --folder.
    #[arg(long)]
    pub overlay_audio: Option<PathBuf>,

    /// Root folder job outputs are created under.
    #[arg(long, short = 'o')]
    pub out: PathBuf,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Jobs processed at once.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Probe and plan only; no media is written.
    #[arg(long)]
    pub dry_run: bool,
}

/// Where base settings come from.
#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Preset settings file (read-only).
    #[arg(long, short = 'p')]
    pub preset: Option<PathBuf>,

    /// Settings file, created with defaults if missing.
    #[arg(long, env = "KSF_CONFIG")]
    pub config: Option<PathBuf>,
}

impl SettingsArgs {
    /// Preset first, then the config file, then defaults.
    ///
    /// A preset that doesn't exist falls back to defaults; see
    /// [`SettingsArgs::missing_preset`].
    pub fn load(&self) -> anyhow::Result<Settings> {
        if let Some(preset) = &self.preset {
            if preset.exists() {
                return ConfigManager::load_preset(preset)
                    .with_context(|| format!("Failed to load preset {}", preset.display()));
            }
            return Ok(Settings::default());
        }

        if let Some(config) = &self.config {
            let mut manager = ConfigManager::new(config);
            manager
                .load_or_create()
                .with_context(|| format!("Failed to load config {}", config.display()))?;
            manager
                .ensure_dirs_exist()
                .context("Failed to create configured folders")?;
            return Ok(manager.settings().clone());
        }

        Ok(Settings::default())
    }

    /// The preset path, if it exists.
    pub fn existing_preset(&self) -> Option<&Path> {
        self.preset.as_deref().filter(|p| p.exists())
    }

    /// A preset that was named but doesn't exist.
    pub fn missing_preset(&self) -> Option<&Path> {
        self.preset.as_deref().filter(|p| !p.exists())
    }
}

impl RunArgs {
    /// Apply command-line overrides onto `settings`.
    pub fn apply_overrides(&self, settings: &mut Settings) -> anyhow::Result<()> {
        if let Some(clip_len) = self.clip_len {
            if !(clip_len > 0.0) {
                bail!("--clip-len must be positive, got {}", clip_len);
            }
            settings.slicing.clip_len = clip_len;
        }
        if let Some(stride) = self.clip_stride {
            if !(stride > 0.0) {
                bail!("--clip-stride must be positive, got {}", stride);
            }
            settings.slicing.stride = stride;
        }
        if self.scene_detect {
            settings.slicing.scene_detect = true;
        }
        if self.hook_detect {
            settings.slicing.hook_detect = true;
        }
        if let Some(max_clips) = self.max_clips {
            settings.slicing.max_clips = Some(max_clips);
        }
        if let Some(min_conf) = self.min_conf {
            settings.alignment.min_conf = min_conf;
        }
        if let Some(ratio) = self.ratio {
            settings.export.ratio = ratio;
        }
        if let Some(position) = self.position {
            settings.overlay.position = position;
        }
        if let Some(opacity) = self.opacity {
            if !(0.0..=1.0).contains(&opacity) {
                bail!("--opacity must be in [0, 1], got {}", opacity);
            }
            settings.overlay.opacity = opacity;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut args = vec![
            "ksf",
            "run",
            "--base",
            "base.mp4",
            "--overlay-video",
            "face.mov",
            "--overlay-audio",
            "voice.wav",
            "--out",
            "out",
        ];
        args.extend_from_slice(extra);
        match parse(&args).command {
            Command::Run(run) => run,
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn run_parses_required_inputs() {
        let run = run_args(&[]);
        assert_eq!(run.base, PathBuf::from("base.mp4"));
        assert_eq!(run.out, PathBuf::from("out"));
        assert!(!run.dry_run);
        assert!(run.clip_len.is_none());
    }

    #[test]
    fn run_requires_overlay() {
        let result = Cli::try_parse_from(["ksf", "run", "--base", "b.mp4", "--out", "o"]);
        assert!(result.is_err());
    }

    #[test]
    fn overrides_only_touch_given_flags() {
        let run = run_args(&[
            "--clip-len",
            "30",
            "--ratio",
            "1:1",
            "--position",
            "bottom-left",
            "--scene-detect",
        ]);
        let mut settings = Settings::default();
        run.apply_overrides(&mut settings).unwrap();

        assert_eq!(settings.slicing.clip_len, 30.0);
        assert_eq!(settings.slicing.stride, 18.0);
        assert!(settings.slicing.scene_detect);
        assert!(!settings.slicing.hook_detect);
        assert_eq!(settings.export.ratio, AspectRatio::new(1, 1));
        assert_eq!(settings.overlay.position, OverlayPosition::BottomLeft);
        assert_eq!(settings.overlay.opacity, 0.9);
    }

    #[test]
    fn bad_ratio_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from([
            "ksf",
            "run",
            "--base",
            "b.mp4",
            "--overlay-video",
            "f.mov",
            "--overlay-audio",
            "v.wav",
            "--out",
            "o",
            "--ratio",
            "wide",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_opacity_fails() {
        let run = run_args(&["--opacity", "1.5"]);
        assert!(run.apply_overrides(&mut Settings::default()).is_err());
    }

    #[test]
    fn batch_needs_csv_or_folder() {
        assert!(Cli::try_parse_from(["ksf", "batch", "--out", "o"]).is_err());
        assert!(Cli::try_parse_from([
            "ksf", "batch", "--csv", "a.csv", "--folder", "f", "--out", "o"
        ])
        .is_err());

        let cli = parse(&["ksf", "batch", "--csv", "jobs.csv", "--out", "o", "-w", "4"]);
        match cli.command {
            Command::Batch(batch) => {
                assert_eq!(batch.csv, Some(PathBuf::from("jobs.csv")));
                assert_eq!(batch.workers, Some(4));
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn folder_batch_requires_overlay() {
        assert!(Cli::try_parse_from(["ksf", "batch", "--folder", "f", "--out", "o"]).is_err());
        assert!(Cli::try_parse_from([
            "ksf",
            "batch",
            "--folder",
            "f",
            "--overlay-video",
            "face.mov",
            "--overlay-audio",
            "voice.wav",
            "--out",
            "o"
        ])
        .is_ok());
    }

    #[test]
    fn missing_preset_falls_back_to_defaults() {
        let args = SettingsArgs {
            preset: Some(PathBuf::from("/definitely/not/here.toml")),
            config: None,
        };
        assert_eq!(args.load().unwrap(), Settings::default());
        assert!(args.existing_preset().is_none());
        assert!(args.missing_preset().is_some());
    }

    #[test]
    fn config_file_creates_configured_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string().replace('\\', "/");
        let config = dir.path().join("settings.toml");
        std::fs::write(
            &config,
            format!(
                "[paths]\noutput_folder = \"{root}/out\"\ntemp_root = \"{root}/tmp\"\nlogs_folder = \"{root}/logs\"\n"
            ),
        )
        .unwrap();

        let args = SettingsArgs {
            preset: None,
            config: Some(config),
        };
        let settings = args.load().unwrap();

        assert_eq!(settings.paths.temp_root, format!("{root}/tmp"));
        for folder in ["out", "tmp", "logs"] {
            assert!(dir.path().join(folder).is_dir(), "{folder} not created");
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
