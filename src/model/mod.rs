pub mod grid;
pub mod mlp;
pub mod persistence;
pub mod scaler;

pub use grid::{
    stratified_folds, CandidateScore, GridSearch, GridSearchResult, ParamGrid, DEFAULT_FOLDS,
};
pub use mlp::{accuracy, HyperParams, LearningRate, MlpClassifier, TrainerSettings};
pub use persistence::Artifact;
pub use scaler::StandardScaler;
