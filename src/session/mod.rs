//! Interactive session plumbing: the bounded history of recent labels, the
//! background worker that records a clip and classifies it, and the prompt
//! loop that drives both.

mod recorder;
mod shell;
mod worker;

use std::collections::{BTreeMap, VecDeque};

use tracing::warn;

use crate::error::{EmotionError, Result};
use crate::types::Emotion;

pub use recorder::{LiveRecorder, MockRecorder, Recorder};
pub use shell::{write_history, Shell, ShellCommand, DEFAULT_POLL_INTERVAL};
pub use worker::{
    PendingPrediction, RecordingOptions, RecordingSession, DEFAULT_RECORDING_FILE,
    DEFAULT_RECORDING_SECONDS,
};

pub const RECENT_CAPACITY: usize = 5;

/// FIFO of the most recent predictions, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPredictions {
    entries: VecDeque<Emotion>,
    capacity: usize,
}

impl Default for RecentPredictions {
    fn default() -> Self {
        Self::with_capacity(RECENT_CAPACITY)
    }
}

impl RecentPredictions {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, label: Emotion) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(label);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Emotion> {
        self.entries.iter()
    }

    pub fn labels(&self) -> Vec<Emotion> {
        self.entries.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<Emotion> {
        self.entries.back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How often each label occurs in the window.
    pub fn tally(&self) -> BTreeMap<Emotion, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.entries {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }
}

/// State owned by the thread that consumes finished predictions.
#[derive(Default)]
pub struct SessionState {
    recent: RecentPredictions,
    pending: Option<PendingPrediction>,
    last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recent(&self) -> &RecentPredictions {
        &self.recent
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a recording. Busy while an earlier one has not been polled or
    /// waited for, even if its worker already finished.
    pub fn begin<R: Recorder + Send + 'static>(
        &mut self,
        session: &RecordingSession<R>,
    ) -> Result<()> {
        if self.pending.is_some() {
            return Err(EmotionError::Busy);
        }
        self.pending = Some(session.start()?);
        Ok(())
    }

    /// Check the in-flight recording; returns its outcome once delivered.
    pub fn poll(&mut self) -> Option<Result<Emotion>> {
        let outcome = self.pending.as_mut()?.try_result()?;
        self.pending = None;
        Some(self.apply(outcome))
    }

    /// Block until the in-flight recording is classified.
    pub fn wait(&mut self) -> Option<Result<Emotion>> {
        let pending = self.pending.take()?;
        Some(self.apply(pending.wait()))
    }

    pub fn accept(&mut self, label: Emotion) {
        self.recent.push(label);
        self.last_error = None;
    }

    fn apply(&mut self, outcome: Result<Emotion>) -> Result<Emotion> {
        match &outcome {
            Ok(label) => self.accept(*label),
            Err(err) => {
                warn!(error = %err, "prediction not recorded in history");
                self.last_error = Some(err.to_string());
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_latest_five() {
        let mut recent = RecentPredictions::default();
        for label in &Emotion::ALL[..7] {
            recent.push(*label);
        }
        assert_eq!(recent.labels(), Emotion::ALL[2..7].to_vec());
        assert_eq!(recent.latest(), Some(Emotion::ALL[6]));
    }

    #[test]
    fn tally_counts_repeats() {
        let mut recent = RecentPredictions::default();
        for label in [Emotion::Sad, Emotion::Happy, Emotion::Sad] {
            recent.push(label);
        }
        let tally = recent.tally();
        assert_eq!(tally[&Emotion::Sad], 2);
        assert_eq!(tally[&Emotion::Happy], 1);
        assert!(!tally.contains_key(&Emotion::Calm));
    }

    #[test]
    fn accepted_labels_clear_previous_error() {
        let mut state = SessionState::new();
        state.last_error = Some("boom".to_string());
        state.accept(Emotion::Calm);
        assert!(state.last_error().is_none());
        assert_eq!(state.recent().labels(), vec![Emotion::Calm]);
        assert!(state.poll().is_none());
    }
}
