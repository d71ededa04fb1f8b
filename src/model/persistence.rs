use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::mlp::MlpClassifier;
use super::scaler::StandardScaler;
use crate::error::{EmotionError, Result};

/// A value that can be written to and read back from an artifact blob.
pub trait Artifact: Serialize + DeserializeOwned {
    /// Tag stored in the envelope so that a scaler is never read as a model.
    const KIND: &'static str;

    /// Consistency checks run after decoding, before the value is handed out.
    fn validate(&self) -> Result<()>;
}

impl Artifact for StandardScaler {
    const KIND: &'static str = "scaler";

    fn validate(&self) -> Result<()> {
        StandardScaler::validate(self)
    }
}

impl Artifact for MlpClassifier {
    const KIND: &'static str = "mlp_classifier";

    fn validate(&self) -> Result<()> {
        MlpClassifier::validate(self)
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    kind: String,
    payload: serde_json::Value,
}

pub fn save<T: Artifact>(artifact: &T, path: &Path) -> Result<()> {
    let write_err = |reason: String| EmotionError::ArtifactWrite {
        path: path.to_path_buf(),
        reason,
    };
    let json = serde_json::to_vec(&EnvelopeRef {
        kind: T::KIND,
        payload: artifact,
    })
    .map_err(|err| write_err(err.to_string()))?;
    fs::write(path, json).map_err(|err| write_err(err.to_string()))?;
    info!(kind = T::KIND, path = %path.display(), "wrote artifact");
    Ok(())
}

pub fn load<T: Artifact>(path: &Path) -> Result<T> {
    let load_err = |reason: String| EmotionError::ArtifactLoad {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|err| load_err(err.to_string()))?;

    let envelope: Envelope =
        serde_json::from_slice(&bytes).map_err(|err| load_err(err.to_string()))?;
    if envelope.kind != T::KIND {
        return Err(load_err(format!(
            "expected a '{}' artifact, found '{}'",
            T::KIND,
            envelope.kind
        )));
    }
    let artifact: T =
        serde_json::from_value(envelope.payload).map_err(|err| load_err(err.to_string()))?;
    artifact
        .validate()
        .map_err(|err| load_err(err.to_string()))?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HyperParams, LearningRate, TrainerSettings};
    use crate::types::Emotion;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn scaler_survives_a_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        let scaler = StandardScaler::fit(&array![[1.0_f32, 4.0], [3.0, 8.0]]).unwrap();
        save(&scaler, &path).unwrap();
        let restored: StandardScaler = load(&path).unwrap();
        assert_eq!(restored.dimension(), 2);
        assert_eq!(restored.mean(), scaler.mean());
        assert_eq!(restored.scale(), scaler.scale());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        let scaler = StandardScaler::fit(&array![[1.0_f32], [2.0]]).unwrap();
        save(&scaler, &path).unwrap();
        let err = load::<MlpClassifier>(&path).unwrap_err();
        assert!(matches!(err, EmotionError::ArtifactLoad { reason, .. } if reason.contains("mlp_classifier")));
    }

    #[test]
    fn missing_or_corrupt_blobs_fail_to_load() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            load::<StandardScaler>(&missing),
            Err(EmotionError::ArtifactLoad { .. })
        ));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, b"{ not json").unwrap();
        assert!(matches!(
            load::<StandardScaler>(&corrupt),
            Err(EmotionError::ArtifactLoad { .. })
        ));
    }

    #[test]
    fn parseable_but_inconsistent_model_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let x = array![[0.0_f32, 1.0], [1.0, 0.0], [0.2, 0.9], [0.9, 0.1]];
        let y = [Emotion::Sad, Emotion::Happy, Emotion::Sad, Emotion::Happy];
        let params = HyperParams {
            hidden_layers: vec![3],
            alpha: 1e-4,
            learning_rate: LearningRate::Constant,
        };
        let settings = TrainerSettings {
            max_iter: 5,
            ..TrainerSettings::default()
        };
        let model =
            MlpClassifier::fit(&x, &y, &[Emotion::Happy, Emotion::Sad], &params, &settings)
                .unwrap();
        save(&model, &path).unwrap();
        load::<MlpClassifier>(&path).unwrap();

        let mut blob: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        blob["payload"]["classes"] = serde_json::json!([]);
        fs::write(&path, serde_json::to_vec(&blob).unwrap()).unwrap();
        assert!(matches!(
            load::<MlpClassifier>(&path),
            Err(EmotionError::ArtifactLoad { reason, .. }) if reason.contains("two classes")
        ));
    }

    #[test]
    fn scaler_with_zero_scale_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        let scaler = StandardScaler::fit(&array![[1.0_f32, 4.0], [3.0, 8.0]]).unwrap();
        save(&scaler, &path).unwrap();

        let mut blob: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        blob["payload"]["scale"]["data"] = serde_json::json!([1.0, 0.0]);
        fs::write(&path, serde_json::to_vec(&blob).unwrap()).unwrap();
        assert!(matches!(
            load::<StandardScaler>(&path),
            Err(EmotionError::ArtifactLoad { .. })
        ));
    }

    #[test]
    fn unwritable_destination_reports_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("scaler.json");
        let scaler = StandardScaler::fit(&array![[1.0_f32], [2.0]]).unwrap();
        assert!(matches!(
            save(&scaler, &path),
            Err(EmotionError::ArtifactWrite { .. })
        ));
    }
}
