use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use emotionalyzer::audio::capture::CaptureConfig;
use emotionalyzer::audio::decoder::decode_audio;
use emotionalyzer::cli::{
    CaptureArgs, Cli, Command, InteractiveArgs, PredictArgs, RecordArgs, TrainArgs,
};
use emotionalyzer::config::{load_param_grid, ArtifactPaths};
use emotionalyzer::dataset::CorpusLayout;
use emotionalyzer::model::{GridSearch, TrainerSettings};
use emotionalyzer::pipeline::{SplitSettings, TrainingPipeline};
use emotionalyzer::session::{LiveRecorder, RecordingOptions, RecordingSession, Shell};
use emotionalyzer::Predictor;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    match cli.command {
        Command::Train(args) => handle_train(&args),
        Command::Predict(args) => handle_predict(&args),
        Command::Record(args) => handle_record(&args),
        Command::Interactive(args) => handle_interactive(&args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn handle_train(args: &TrainArgs) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    let paths = ArtifactPaths::from_override(args.artifacts.clone());
    let grid = load_param_grid(args.grid_file.as_deref(), args.grid_json.as_deref())
        .context("Failed to load parameter grid")?;
    let settings = TrainerSettings {
        max_iter: args.max_iter,
        seed: args.seed,
        ..TrainerSettings::default()
    };
    let search = GridSearch::new(grid, args.folds, settings).context("Invalid search settings")?;
    let pipeline = TrainingPipeline::new(CorpusLayout::new(&args.corpus))
        .with_features(args.features.feature_config())
        .with_split(SplitSettings {
            test_ratio: args.test_ratio,
            seed: args.seed,
        })
        .with_search(search);

    println!("Training on corpus {:?}", args.corpus);
    let report = pipeline.run(&paths).context("Training failed")?;

    println!(
        "Samples: {} train / {} test, {} features",
        report.train_size, report.test_size, report.feature_dim
    );
    println!("Training label counts:");
    for (label, count) in &report.class_counts {
        println!("  {:<10} {}", label, count);
    }
    println!("Best parameters: {}", report.best_params);
    println!("Cross-validation accuracy: {:.2}%", report.cv_accuracy * 100.0);
    println!("Test accuracy: {:.2}%", report.test_accuracy * 100.0);
    println!("Artifacts written to {:?}", paths.dir);
    Ok(())
}

fn load_predictor(artifacts: Option<PathBuf>) -> Result<Predictor> {
    let paths = ArtifactPaths::from_override(artifacts);
    Predictor::load(&paths)
        .with_context(|| format!("Failed to load trained artifacts from {:?}", paths.dir))
}

fn handle_predict(args: &PredictArgs) -> Result<()> {
    let predictor = load_predictor(args.artifacts.clone())?;
    if args.distribution {
        let waveform = decode_audio(&args.file)
            .with_context(|| format!("Failed to decode {:?}", args.file))?;
        let distribution = predictor.predict_distribution(&waveform)?;
        if let Some((label, _)) = distribution.first() {
            println!("{}", label);
        }
        for (label, probability) in &distribution {
            println!("  {:<10} {:.3}", label, probability);
        }
    } else {
        let label = predictor
            .predict_file(&args.file)
            .with_context(|| format!("Failed to classify {:?}", args.file))?;
        println!("{}", label);
    }
    Ok(())
}

fn recording_session(
    predictor: Predictor,
    capture: &CaptureArgs,
) -> Result<RecordingSession<LiveRecorder>> {
    capture.validate()?;
    let duration = Duration::from_secs_f64(capture.duration);
    let recorder = LiveRecorder::new(
        CaptureConfig::new(duration)
            .with_device(capture.device.clone())
            .with_sample_rate(capture.sample_rate),
    );
    let options = RecordingOptions {
        duration,
        recording_path: capture.output.clone(),
    };
    Ok(RecordingSession::new(Arc::new(predictor), recorder, options))
}

fn handle_record(args: &RecordArgs) -> Result<()> {
    let predictor = load_predictor(args.artifacts.clone())?;
    let session = recording_session(predictor, &args.capture)?;
    println!("Recording for {:.1} seconds...", args.capture.duration);
    let label = session
        .start()?
        .wait()
        .context("Failed to record and classify audio")?;
    println!("{}", label);
    Ok(())
}

fn handle_interactive(args: &InteractiveArgs) -> Result<()> {
    let predictor = load_predictor(args.artifacts.clone())?;
    let session = recording_session(predictor, &args.capture)?;
    Shell::new(session, io::stdout())
        .run(spawn_stdin_reader()?)
        .context("Interactive session failed")?;
    Ok(())
}

/// Forward stdin lines to the prompt loop so it can keep polling the worker.
fn spawn_stdin_reader() -> Result<Receiver<io::Result<String>>> {
    let (tx, rx) = channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}
