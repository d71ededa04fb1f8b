use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};

use crate::audio::capture::DEFAULT_CAPTURE_RATE;
use crate::features::{FeatureConfig, DEFAULT_MFCC_COUNT};
use crate::session::{DEFAULT_RECORDING_FILE, DEFAULT_RECORDING_SECONDS};

#[derive(Parser, Debug)]
#[command(
    name = "emotionalyzer",
    version,
    about = "Speech emotion recognition: train a classifier on a labeled corpus and classify recordings"
)]
pub struct Cli {
    /// Default log filter when RUST_LOG is unset (e.g. info, debug, emotionalyzer=trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract features from a corpus, grid-search the classifier and save artifacts.
    Train(TrainArgs),
    /// Classify one audio file with saved artifacts.
    Predict(PredictArgs),
    /// Record from the microphone and classify the recording.
    Record(RecordArgs),
    /// Terminal session: record or upload clips and keep a short history.
    Interactive(InteractiveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FeatureArgs {
    /// Skip MFCC means and deltas.
    #[arg(long)]
    pub no_mfcc: bool,
    /// Skip the 12 chroma bins.
    #[arg(long)]
    pub no_chroma: bool,
    /// Skip the 128 log-mel bands.
    #[arg(long)]
    pub no_mel: bool,
    /// Number of cepstral coefficients.
    #[arg(long, default_value_t = DEFAULT_MFCC_COUNT)]
    pub n_mfcc: usize,
}

impl FeatureArgs {
    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            mfcc: !self.no_mfcc,
            chroma: !self.no_chroma,
            mel: !self.no_mel,
            n_mfcc: self.n_mfcc,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Corpus root holding Actor_* speaker directories.
    #[arg(long, value_name = "DIR")]
    pub corpus: PathBuf,
    /// Directory to write the model, scaler and report to.
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,
    /// Fraction of the corpus held out for testing.
    #[arg(long, default_value_t = 0.2)]
    pub test_ratio: f64,
    /// Seed for the train/test shuffle and network initialisation.
    #[arg(long, default_value_t = 9)]
    pub seed: u64,
    /// Cross-validation folds per grid candidate.
    #[arg(long, default_value_t = 3)]
    pub folds: usize,
    /// Maximum training epochs per fit.
    #[arg(long, default_value_t = 500)]
    pub max_iter: usize,
    /// Path to a JSON parameter grid.
    #[arg(long, value_name = "PATH", conflicts_with = "grid_json")]
    pub grid_file: Option<PathBuf>,
    /// Inline JSON parameter grid.
    #[arg(long, value_name = "JSON", conflicts_with = "grid_file")]
    pub grid_json: Option<String>,
    #[command(flatten)]
    pub features: FeatureArgs,
}

impl TrainArgs {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.corpus.is_dir(),
            "corpus directory does not exist: {:?}",
            self.corpus
        );
        ensure!(
            self.test_ratio > 0.0 && self.test_ratio < 1.0,
            "test ratio must lie strictly between 0 and 1, got {}",
            self.test_ratio
        );
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Audio file to classify.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Directory holding emotion_model.json and scaler.json. The feature
    /// configuration is read back from the scaler.
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,
    /// Print the probability of every class.
    #[arg(long)]
    pub distribution: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Optional input device name.
    #[arg(long)]
    pub device: Option<String>,
    /// Recording length in seconds.
    #[arg(long, default_value_t = DEFAULT_RECORDING_SECONDS as f64)]
    pub duration: f64,
    /// Rate the recording is resampled to and saved at.
    #[arg(long, default_value_t = DEFAULT_CAPTURE_RATE)]
    pub sample_rate: u32,
    /// Where the recording is written before classification.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_RECORDING_FILE)]
    pub output: PathBuf,
}

impl CaptureArgs {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.duration.is_finite() && self.duration > 0.0,
            "duration must be positive, got {}",
            self.duration
        );
        ensure!(self.sample_rate > 0, "sample rate must be positive");
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,
    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InteractiveArgs {
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,
    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn train_defaults_follow_reference_setup() {
        let cli = Cli::try_parse_from(["emotionalyzer", "train", "--corpus", "data"]).unwrap();
        assert_eq!(cli.log_level, "info");
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        assert_eq!(args.corpus, PathBuf::from("data"));
        assert_eq!(args.test_ratio, 0.2);
        assert_eq!(args.seed, 9);
        assert_eq!(args.folds, 3);
        assert_eq!(args.max_iter, 500);
        assert_eq!(args.features.feature_config().dimension(), 202);
    }

    #[test]
    fn grid_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "emotionalyzer",
            "train",
            "--corpus",
            "data",
            "--grid-file",
            "grid.json",
            "--grid-json",
            "{}",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn feature_toggles_only_apply_to_training() {
        let cli = Cli::try_parse_from([
            "emotionalyzer",
            "--log-level",
            "debug",
            "train",
            "--corpus",
            "data",
            "--no-chroma",
            "--n-mfcc",
            "36",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        let config = args.features.feature_config();
        assert!(!config.chroma);
        assert_eq!(config.dimension(), 36 * 2 + 128 + 2);

        for command in ["predict", "record", "interactive"] {
            let mut argv = vec!["emotionalyzer", command];
            if command == "predict" {
                argv.push("clip.wav");
            }
            argv.push("--no-chroma");
            assert!(Cli::try_parse_from(argv).is_err(), "{} took --no-chroma", command);
        }
    }

    #[test]
    fn record_defaults_and_validation() {
        let cli = Cli::try_parse_from(["emotionalyzer", "record"]).unwrap();
        let Command::Record(args) = cli.command else {
            panic!("expected record command");
        };
        assert_eq!(args.capture.duration, 5.0);
        assert_eq!(args.capture.sample_rate, 22_050);
        assert_eq!(args.capture.output, PathBuf::from("real_time_audio.wav"));
        args.capture.validate().unwrap();

        let cli =
            Cli::try_parse_from(["emotionalyzer", "record", "--duration", "0"]).unwrap();
        let Command::Record(args) = cli.command else {
            panic!("expected record command");
        };
        assert!(args.capture.validate().is_err());
    }
}
