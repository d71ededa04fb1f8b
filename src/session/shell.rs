use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::debug;

use super::recorder::Recorder;
use super::worker::RecordingSession;
use super::{RecentPredictions, SessionState};
use crate::error::{EmotionError, Result};
use crate::types::Emotion;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Record,
    Upload(PathBuf),
    Quit,
    Empty,
    Unknown(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (command, argument) = line
            .split_once(' ')
            .map_or((line, ""), |(cmd, rest)| (cmd, rest.trim()));
        match (command, argument) {
            ("", _) => Self::Empty,
            ("q", "") => Self::Quit,
            ("r", "") => Self::Record,
            ("u", path) if !path.is_empty() => Self::Upload(PathBuf::from(path)),
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Prompt loop over lines delivered by a reader thread. Recordings run on the
/// session's worker and are reported whenever a poll finds them finished, so
/// uploads and quitting stay responsive while the microphone is busy.
pub struct Shell<R, W> {
    session: RecordingSession<R>,
    state: SessionState,
    out: W,
    poll_interval: Duration,
}

impl<R: Recorder + Send + 'static, W: Write> Shell<R, W> {
    pub fn new(session: RecordingSession<R>, out: W) -> Self {
        Self {
            session,
            state: SessionState::new(),
            out,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until `q` or until the line source closes. A recording still in
    /// flight when input ends is waited for so its label is not lost.
    pub fn run(mut self, lines: Receiver<io::Result<String>>) -> Result<SessionState> {
        writeln!(
            self.out,
            "Commands: r = record, u <path> = classify a file, q = quit"
        )?;
        self.prompt()?;
        loop {
            match lines.recv_timeout(self.poll_interval) {
                Ok(line) => {
                    if !self.dispatch(ShellCommand::parse(&line?))? {
                        break;
                    }
                    self.prompt()?;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(outcome) = self.state.wait() {
                        self.report(outcome)?;
                    }
                    break;
                }
            }
            if let Some(outcome) = self.state.poll() {
                writeln!(self.out)?;
                self.report(outcome)?;
                self.prompt()?;
            }
        }
        Ok(self.state)
    }

    /// Returns `false` when the loop should stop.
    fn dispatch(&mut self, command: ShellCommand) -> Result<bool> {
        debug!(?command, "interactive command");
        match command {
            ShellCommand::Quit => return Ok(false),
            ShellCommand::Empty => {}
            ShellCommand::Record => match self.state.begin(&self.session) {
                Ok(()) => writeln!(
                    self.out,
                    "Recording for {:.1} seconds...",
                    self.session.options().duration.as_secs_f64()
                )?,
                Err(EmotionError::Busy) => {
                    writeln!(self.out, "A recording is already in progress")?
                }
                Err(err) => writeln!(self.out, "Could not start recording: {}", err)?,
            },
            ShellCommand::Upload(path) => match self.session.predictor().predict_file(&path) {
                Ok(label) => {
                    self.state.accept(label);
                    self.report(Ok(label))?;
                }
                Err(err) => writeln!(self.out, "Could not classify {}: {}", path.display(), err)?,
            },
            ShellCommand::Unknown(line) => writeln!(self.out, "Unknown command: {}", line)?,
        }
        Ok(true)
    }

    fn report(&mut self, outcome: Result<Emotion>) -> Result<()> {
        match outcome {
            Ok(label) => writeln!(self.out, "Detected emotion: {}", label)?,
            Err(err) => writeln!(self.out, "Error: {}", err)?,
        }
        write_history(&mut self.out, self.state.recent())?;
        Ok(())
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Recent labels, oldest first, followed by how often each occurs.
pub fn write_history<W: Write>(out: &mut W, recent: &RecentPredictions) -> io::Result<()> {
    if recent.is_empty() {
        return Ok(());
    }
    let labels: Vec<String> = recent.iter().map(ToString::to_string).collect();
    writeln!(out, "Recent: {}", labels.join(", "))?;
    let tally: Vec<String> = recent
        .tally()
        .iter()
        .map(|(label, count)| format!("{} x{}", label, count))
        .collect();
    writeln!(out, "Tally:  {}", tally.join(", "))
}
