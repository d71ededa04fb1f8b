use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EmotionError, Result};
use crate::model::ParamGrid;

pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
pub const MODEL_FILE: &str = "emotion_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const REPORT_FILE: &str = "training_report.json";

/// Location of the trained model, its scaler and the training report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_override(path: Option<PathBuf>) -> Self {
        Self::new(path.unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR)))
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    pub fn ensure_dir(&self) -> Result<()> {
        if self.dir.exists() && !self.dir.is_dir() {
            return Err(EmotionError::InvalidConfig(format!(
                "artifacts path {:?} is not a directory",
                self.dir
            )));
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Grid override from a JSON file or an inline JSON string; falls back to the
/// default grid when neither is given.
pub fn load_param_grid(path: Option<&Path>, json: Option<&str>) -> Result<ParamGrid> {
    let grid = match (path, json) {
        (Some(_), Some(_)) => {
            return Err(EmotionError::InvalidConfig(
                "pass either a grid file or inline grid JSON, not both".to_string(),
            ))
        }
        (Some(path), None) => {
            let raw = fs::read_to_string(path).map_err(|err| {
                EmotionError::InvalidConfig(format!("failed to read grid file {:?}: {}", path, err))
            })?;
            parse_grid(&raw)?
        }
        (None, Some(raw)) => parse_grid(raw)?,
        (None, None) => ParamGrid::default(),
    };
    grid.validate()?;
    Ok(grid)
}

fn parse_grid(raw: &str) -> Result<ParamGrid> {
    serde_json::from_str(raw)
        .map_err(|err| EmotionError::InvalidConfig(format!("invalid parameter grid: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_to_local_artifacts_dir() {
        let paths = ArtifactPaths::from_override(None);
        assert_eq!(paths.dir, PathBuf::from("artifacts"));
        assert!(paths.model_path().ends_with("emotion_model.json"));
        assert!(paths.scaler_path().ends_with("scaler.json"));
        assert!(paths.report_path().ends_with("training_report.json"));
    }

    #[test]
    fn ensure_dir_creates_nested_override() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::from_override(Some(dir.path().join("a").join("b")));
        paths.ensure_dir().unwrap();
        assert!(paths.dir.is_dir());
    }

    #[test]
    fn grid_from_file_and_inline_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("grid.json");
        fs::write(
            &file,
            r#"{"hidden_layer_sizes": [[8]], "alpha": [0.01], "learning_rate": ["constant"]}"#,
        )
        .unwrap();
        assert_eq!(load_param_grid(Some(&file), None).unwrap().len(), 1);

        let inline = r#"{"hidden_layers": [[8], [4]], "alphas": [0.1], "learning_rates": ["adaptive"]}"#;
        assert_eq!(load_param_grid(None, Some(inline)).unwrap().len(), 2);

        assert_eq!(load_param_grid(None, None).unwrap(), ParamGrid::default());
    }

    #[test]
    fn rejects_bad_grids() {
        assert!(load_param_grid(None, Some("{}")).is_err());
        let empty_axis = r#"{"hidden_layer_sizes": [], "alpha": [0.01], "learning_rate": ["constant"]}"#;
        assert!(load_param_grid(None, Some(empty_axis)).is_err());
        let dir = tempdir().unwrap();
        assert!(load_param_grid(Some(&dir.path().join("nope.json")), None).is_err());
    }
}
