use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use ndarray::{Array1, Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmotionError, Result};
use crate::types::Emotion;

const BETA_1: f32 = 0.9;
const BETA_2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-8;
const PROB_FLOOR: f32 = 1e-10;
const ADAPTIVE_DECAY: f32 = 5.0;
const MIN_ADAPTIVE_RATE: f32 = 1e-6;

/// Step-size schedule. `Adaptive` divides the step by 5 whenever the loss
/// plateaus instead of stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningRate {
    Constant,
    Adaptive,
}

impl Display for LearningRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LearningRate::Constant => f.write_str("constant"),
            LearningRate::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// One point of the hyperparameter grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub hidden_layers: Vec<usize>,
    pub alpha: f32,
    pub learning_rate: LearningRate,
}

impl Display for HyperParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let layers: Vec<String> = self.hidden_layers.iter().map(usize::to_string).collect();
        write!(
            f,
            "hidden=({}) alpha={} learning_rate={}",
            layers.join(","),
            self.alpha,
            self.learning_rate
        )
    }
}

/// Optimizer settings shared by every fit of a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerSettings {
    pub max_iter: usize,
    pub learning_rate_init: f32,
    pub batch_size: usize,
    pub tol: f32,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            max_iter: 500,
            learning_rate_init: 1e-3,
            batch_size: 200,
            tol: 1e-4,
            n_iter_no_change: 10,
            seed: 9,
        }
    }
}

impl TrainerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 || self.batch_size == 0 {
            return Err(EmotionError::InvalidConfig(
                "max_iter and batch_size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate_init > 0.0) {
            return Err(EmotionError::InvalidConfig(format!(
                "learning_rate_init must be positive, got {}",
                self.learning_rate_init
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

/// Feed-forward network with ReLU hidden layers and a softmax output over a
/// fixed set of emotion classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    classes: Vec<Emotion>,
    params: HyperParams,
    layers: Vec<Layer>,
    epochs: usize,
    loss: f32,
}

impl MlpClassifier {
    /// Train on `x` (rows are samples). `classes` fixes the output layer and
    /// must contain every label in `y`.
    pub fn fit(
        x: &Array2<f32>,
        y: &[Emotion],
        classes: &[Emotion],
        params: &HyperParams,
        settings: &TrainerSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let (samples, inputs) = x.dim();
        if samples == 0 || samples != y.len() {
            return Err(EmotionError::Training(format!(
                "feature rows ({}) and labels ({}) must be equal and non-zero",
                samples,
                y.len()
            )));
        }
        if classes.len() < 2 {
            return Err(EmotionError::Training(
                "at least two distinct classes are required".to_string(),
            ));
        }
        if params.hidden_layers.iter().any(|&width| width == 0) {
            return Err(EmotionError::InvalidConfig(
                "hidden layer widths must be positive".to_string(),
            ));
        }
        let targets = one_hot(y, classes)?;

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let mut widths = Vec::with_capacity(params.hidden_layers.len() + 2);
        widths.push(inputs);
        widths.extend(params.hidden_layers.iter().copied());
        widths.push(classes.len());
        let mut layers: Vec<Layer> = widths
            .windows(2)
            .map(|pair| glorot_layer(pair[0], pair[1], &mut rng))
            .collect();

        let mut optimizer = Adam::new(&layers, settings.learning_rate_init);
        let batch_size = settings.batch_size.min(samples);
        let mut order: Vec<usize> = (0..samples).collect();
        let mut best_loss = f32::INFINITY;
        let mut stale_epochs = 0usize;
        let mut epochs = 0usize;
        let mut epoch_loss = f32::INFINITY;

        while epochs < settings.max_iter {
            order.shuffle(&mut rng);
            let mut accumulated = 0.0_f32;
            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = targets.select(Axis(0), batch);
                let (loss, grads) = backpropagate(&layers, &xb, &yb, params.alpha);
                optimizer.step(&mut layers, &grads);
                accumulated += loss * batch.len() as f32;
            }
            epochs += 1;
            epoch_loss = accumulated / samples as f32;
            if !epoch_loss.is_finite() {
                return Err(EmotionError::Training(format!(
                    "loss diverged at epoch {} ({})",
                    epochs, params
                )));
            }

            if epoch_loss > best_loss - settings.tol {
                stale_epochs += 1;
            } else {
                stale_epochs = 0;
            }
            best_loss = best_loss.min(epoch_loss);

            if stale_epochs > settings.n_iter_no_change {
                match params.learning_rate {
                    LearningRate::Adaptive if optimizer.rate > MIN_ADAPTIVE_RATE => {
                        optimizer.rate /= ADAPTIVE_DECAY;
                        stale_epochs = 0;
                        debug!(epoch = epochs, rate = optimizer.rate, "reduced learning rate");
                    }
                    _ => break,
                }
            }
        }
        debug!(epochs, loss = epoch_loss, %params, "network converged");

        Ok(Self {
            classes: classes.to_vec(),
            params: params.clone(),
            layers,
            epochs,
            loss: epoch_loss,
        })
    }

    pub fn classes(&self) -> &[Emotion] {
        &self.classes
    }

    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn loss(&self) -> f32 {
        self.loss
    }

    pub fn input_dim(&self) -> usize {
        self.layers
            .first()
            .map(|layer| layer.weights.len_of(Axis(0)))
            .unwrap_or(0)
    }

    /// Class probabilities, one row per input row, columns in `classes()` order.
    pub fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        EmotionError::check_dimension(self.input_dim(), x.len_of(Axis(1)))?;
        let activations = forward(&self.layers, x);
        Ok(activations
            .into_iter()
            .last()
            .unwrap_or_else(|| Array2::zeros((x.nrows(), self.classes.len()))))
    }

    pub fn predict(&self, x: &Array2<f32>) -> Result<Vec<Emotion>> {
        let probabilities = self.predict_proba(x)?;
        Ok(probabilities
            .outer_iter()
            .map(|row| self.classes[argmax(row.iter().copied())])
            .collect())
    }

    pub fn predict_one(&self, features: &Array1<f32>) -> Result<Emotion> {
        let row = features.view().insert_axis(Axis(0)).to_owned();
        let labels = self.predict(&row)?;
        labels
            .into_iter()
            .next()
            .ok_or_else(|| EmotionError::Training("empty prediction".to_string()))
    }

    /// Fraction of rows whose predicted label matches `y`.
    pub fn score(&self, x: &Array2<f32>, y: &[Emotion]) -> Result<f32> {
        let predicted = self.predict(x)?;
        Ok(accuracy(&predicted, y))
    }

    /// Structural checks for a network read back from disk: distinct
    /// classes, chained layer shapes and an output per class.
    pub fn validate(&self) -> Result<()> {
        if self.classes.len() < 2 {
            return Err(EmotionError::InvalidConfig(format!(
                "model needs at least two classes, has {}",
                self.classes.len()
            )));
        }
        let distinct: BTreeSet<Emotion> = self.classes.iter().copied().collect();
        if distinct.len() != self.classes.len() {
            return Err(EmotionError::InvalidConfig(
                "model classes must be distinct".to_string(),
            ));
        }
        if self.layers.is_empty() || self.input_dim() == 0 {
            return Err(EmotionError::InvalidConfig("model has no layers".to_string()));
        }
        let mut width = self.input_dim();
        for layer in &self.layers {
            let (inputs, outputs) = layer.weights.dim();
            EmotionError::check_dimension(width, inputs)?;
            EmotionError::check_dimension(outputs, layer.bias.len())?;
            if !layer.weights.iter().chain(layer.bias.iter()).all(|w| w.is_finite()) {
                return Err(EmotionError::InvalidConfig(
                    "model weights must be finite".to_string(),
                ));
            }
            width = outputs;
        }
        EmotionError::check_dimension(self.classes.len(), width)
    }
}

pub fn accuracy(predicted: &[Emotion], truth: &[Emotion]) -> f32 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    hits as f32 / truth.len() as f32
}

fn one_hot(y: &[Emotion], classes: &[Emotion]) -> Result<Array2<f32>> {
    let mut targets = Array2::zeros((y.len(), classes.len()));
    for (row, label) in y.iter().enumerate() {
        let col = classes.iter().position(|c| c == label).ok_or_else(|| {
            EmotionError::Training(format!("label '{}' is not among the model classes", label))
        })?;
        targets[[row, col]] = 1.0;
    }
    Ok(targets)
}

fn glorot_layer(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Layer {
    let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
    Layer {
        weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound)),
        bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)),
    }
}

/// Layer outputs; the first entry is the input, the last the softmax output.
fn forward(layers: &[Layer], x: &Array2<f32>) -> Vec<Array2<f32>> {
    let mut activations = Vec::with_capacity(layers.len() + 1);
    activations.push(x.clone());
    for (idx, layer) in layers.iter().enumerate() {
        let mut z = activations[idx].dot(&layer.weights) + &layer.bias;
        if idx + 1 == layers.len() {
            softmax_rows(&mut z);
        } else {
            z.mapv_inplace(|v| v.max(0.0));
        }
        activations.push(z);
    }
    activations
}

fn softmax_rows(z: &mut Array2<f32>) {
    for mut row in z.outer_iter_mut() {
        let peak = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - peak).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
}

struct Gradients {
    weights: Vec<Array2<f32>>,
    biases: Vec<Array1<f32>>,
}

/// Cross-entropy plus L2 penalty for one minibatch and its gradients.
fn backpropagate(
    layers: &[Layer],
    x: &Array2<f32>,
    targets: &Array2<f32>,
    alpha: f32,
) -> (f32, Gradients) {
    let batch = x.nrows() as f32;
    let activations = forward(layers, x);
    let output = &activations[layers.len()];

    let cross_entropy = -Zip::from(output)
        .and(targets)
        .fold(0.0_f32, |acc, &p, &t| acc + t * p.max(PROB_FLOOR).ln())
        / batch;
    let penalty: f32 = layers
        .iter()
        .map(|layer| layer.weights.mapv(|w| w * w).sum())
        .sum::<f32>()
        * 0.5
        * alpha
        / batch;

    let mut weights = vec![Array2::zeros((0, 0)); layers.len()];
    let mut biases = vec![Array1::zeros(0); layers.len()];
    let mut delta = (output - targets) / batch;
    for idx in (0..layers.len()).rev() {
        weights[idx] =
            activations[idx].t().dot(&delta) + &(&layers[idx].weights * (alpha / batch));
        biases[idx] = delta.sum_axis(Axis(0));
        if idx > 0 {
            let mut upstream = delta.dot(&layers[idx].weights.t());
            Zip::from(&mut upstream)
                .and(&activations[idx])
                .for_each(|d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
            delta = upstream;
        }
    }

    (cross_entropy + penalty, Gradients { weights, biases })
}

struct Adam {
    rate: f32,
    step: i32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
}

impl Adam {
    fn new(layers: &[Layer], rate: f32) -> Self {
        let zeros_w = || {
            layers
                .iter()
                .map(|layer| Array2::zeros(layer.weights.raw_dim()))
                .collect::<Vec<Array2<f32>>>()
        };
        let zeros_b = || {
            layers
                .iter()
                .map(|layer| Array1::zeros(layer.bias.raw_dim()))
                .collect::<Vec<Array1<f32>>>()
        };
        Self {
            rate,
            step: 0,
            m_weights: zeros_w(),
            v_weights: zeros_w(),
            m_biases: zeros_b(),
            v_biases: zeros_b(),
        }
    }

    fn step(&mut self, layers: &mut [Layer], grads: &Gradients) {
        self.step += 1;
        let correction =
            (1.0 - BETA_2.powi(self.step)).sqrt() / (1.0 - BETA_1.powi(self.step));
        let rate = self.rate * correction;
        for (idx, layer) in layers.iter_mut().enumerate() {
            Zip::from(&mut layer.weights)
                .and(&mut self.m_weights[idx])
                .and(&mut self.v_weights[idx])
                .and(&grads.weights[idx])
                .for_each(|param, m, v, &g| adam_update(param, m, v, g, rate));
            Zip::from(&mut layer.bias)
                .and(&mut self.m_biases[idx])
                .and(&mut self.v_biases[idx])
                .and(&grads.biases[idx])
                .for_each(|param, m, v, &g| adam_update(param, m, v, g, rate));
        }
    }
}

fn adam_update(param: &mut f32, m: &mut f32, v: &mut f32, grad: f32, rate: f32) {
    *m = BETA_1 * *m + (1.0 - BETA_1) * grad;
    *v = BETA_2 * *v + (1.0 - BETA_2) * grad * grad;
    *param -= rate * *m / (v.sqrt() + ADAM_EPSILON);
}

fn argmax<I>(values: I) -> usize
where
    I: Iterator<Item = f32>,
{
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (idx, value) in values.enumerate() {
        if value > best_value {
            best = idx;
            best_value = value;
        }
    }
    best
}
