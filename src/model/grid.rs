use std::collections::BTreeSet;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::mlp::{HyperParams, LearningRate, MlpClassifier, TrainerSettings};
use crate::error::{EmotionError, Result};
use crate::types::Emotion;

pub const DEFAULT_FOLDS: usize = 3;

/// Hyperparameter axes searched exhaustively; parsed from JSON overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    #[serde(alias = "hidden_layers", alias = "hiddenLayerSizes")]
    pub hidden_layer_sizes: Vec<Vec<usize>>,
    #[serde(alias = "alphas")]
    pub alpha: Vec<f32>,
    #[serde(alias = "learning_rates", alias = "learningRate")]
    pub learning_rate: Vec<LearningRate>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![vec![100], vec![300, 100]],
            alpha: vec![1e-4, 1e-3, 1e-2],
            learning_rate: vec![LearningRate::Constant, LearningRate::Adaptive],
        }
    }
}

impl ParamGrid {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layer_sizes.is_empty()
            || self.alpha.is_empty()
            || self.learning_rate.is_empty()
        {
            return Err(EmotionError::InvalidConfig(
                "every grid axis needs at least one value".to_string(),
            ));
        }
        for (idx, layers) in self.hidden_layer_sizes.iter().enumerate() {
            if layers.is_empty() || layers.contains(&0) {
                return Err(EmotionError::InvalidConfig(format!(
                    "hidden layer topology {} must list positive widths",
                    idx
                )));
            }
        }
        if let Some(alpha) = self.alpha.iter().find(|a| !(**a >= 0.0)) {
            return Err(EmotionError::InvalidConfig(format!(
                "alpha must be non-negative, got {}",
                alpha
            )));
        }
        Ok(())
    }

    /// Every combination; topology varies slowest, learning rate fastest.
    pub fn combinations(&self) -> Vec<HyperParams> {
        let mut combos = Vec::with_capacity(self.len());
        for hidden in &self.hidden_layer_sizes {
            for &alpha in &self.alpha {
                for &learning_rate in &self.learning_rate {
                    combos.push(HyperParams {
                        hidden_layers: hidden.clone(),
                        alpha,
                        learning_rate,
                    });
                }
            }
        }
        combos
    }

    pub fn len(&self) -> usize {
        self.hidden_layer_sizes.len() * self.alpha.len() * self.learning_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: HyperParams,
    pub mean_accuracy: f32,
    pub fold_accuracies: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: HyperParams,
    pub best_score: f32,
    pub candidates: Vec<CandidateScore>,
    pub model: MlpClassifier,
}

/// Exhaustive search scored by stratified k-fold accuracy, followed by a
/// refit of the winner on all rows.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    folds: usize,
    settings: TrainerSettings,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            folds: DEFAULT_FOLDS,
            settings: TrainerSettings::default(),
        }
    }
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize, settings: TrainerSettings) -> Result<Self> {
        grid.validate()?;
        settings.validate()?;
        if folds < 2 {
            return Err(EmotionError::InvalidConfig(format!(
                "cross-validation needs at least 2 folds, got {}",
                folds
            )));
        }
        Ok(Self {
            grid,
            folds,
            settings,
        })
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Ties keep the earliest combination in enumeration order.
    pub fn fit(&self, x: &Array2<f32>, y: &[Emotion]) -> Result<GridSearchResult> {
        let samples = x.len_of(Axis(0));
        if samples != y.len() {
            return Err(EmotionError::Training(format!(
                "feature rows ({}) and labels ({}) differ",
                samples,
                y.len()
            )));
        }
        if samples < self.folds {
            return Err(EmotionError::Training(format!(
                "{} samples cannot be split into {} folds",
                samples, self.folds
            )));
        }
        let classes: Vec<Emotion> = y
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let folds = stratified_folds(y, self.folds);

        let mut candidates = Vec::with_capacity(self.grid.len());
        let mut best: Option<(usize, f32)> = None;
        for (idx, params) in self.grid.combinations().into_iter().enumerate() {
            let fold_accuracies = self.cross_validate(x, y, &classes, &folds, &params)?;
            let mean_accuracy = fold_accuracies.iter().sum::<f32>() / fold_accuracies.len() as f32;
            info!(
                candidate = idx + 1,
                total = self.grid.len(),
                %params,
                mean_accuracy,
                "scored grid candidate"
            );
            if best.map(|(_, score)| mean_accuracy > score).unwrap_or(true) {
                best = Some((idx, mean_accuracy));
            }
            candidates.push(CandidateScore {
                params,
                mean_accuracy,
                fold_accuracies,
            });
        }

        let (best_idx, best_score) =
            best.ok_or_else(|| EmotionError::Training("parameter grid is empty".to_string()))?;
        let best_params = candidates[best_idx].params.clone();
        info!(%best_params, best_score, "refitting best candidate on full training set");
        let model = MlpClassifier::fit(x, y, &classes, &best_params, &self.settings)?;

        Ok(GridSearchResult {
            best_params,
            best_score,
            candidates,
            model,
        })
    }

    fn cross_validate(
        &self,
        x: &Array2<f32>,
        y: &[Emotion],
        classes: &[Emotion],
        folds: &[Vec<usize>],
        params: &HyperParams,
    ) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(folds.len());
        for held_out in folds {
            let train_idx = complement(y.len(), held_out);
            let train_y: Vec<Emotion> = train_idx.iter().map(|&i| y[i]).collect();
            let held_y: Vec<Emotion> = held_out.iter().map(|&i| y[i]).collect();
            let model = MlpClassifier::fit(
                &x.select(Axis(0), &train_idx),
                &train_y,
                classes,
                params,
                &self.settings,
            )?;
            scores.push(model.score(&x.select(Axis(0), held_out), &held_y)?);
        }
        Ok(scores)
    }
}

/// Held-out index sets for `k` folds. Each class is dealt round-robin so the
/// folds keep the label proportions and differ in size by at most one.
pub fn stratified_folds(labels: &[Emotion], k: usize) -> Vec<Vec<usize>> {
    let n = k.max(1);
    let mut folds = vec![Vec::new(); n];
    let classes: BTreeSet<Emotion> = labels.iter().copied().collect();
    let mut dealt = 0usize;
    for class in classes {
        for (idx, _) in labels.iter().enumerate().filter(|(_, l)| **l == class) {
            folds[dealt % n].push(idx);
            dealt += 1;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

fn complement(n: usize, held_out: &[usize]) -> Vec<usize> {
    let excluded: BTreeSet<usize> = held_out.iter().copied().collect();
    (0..n).filter(|i| !excluded.contains(i)).collect()
}
