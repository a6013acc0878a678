//! Model artifact persistence.
//!
//! Artifacts are JSON files in a configurable directory. When no explicit
//! path is given, the newest file by modification time wins.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ml::trainer::TrainedModel;

/// File extension of serialized models.
const MODEL_EXTENSION: &str = "json";

/// Serialize a trained model to `path`, creating parent directories.
pub fn save_model(model: &TrainedModel, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create model directory")?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create model file {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), model).context("Failed to serialize model")?;
    Ok(())
}

/// Load a trained model from `path`.
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open model file {}", path.display()))?;
    let model = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to deserialize model {}", path.display()))?;
    Ok(model)
}

/// Newest model file in `dir` by modification time. `None` when the directory
/// is missing or holds no model files.
pub fn find_latest_model(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext == MODEL_EXTENSION)
                    .unwrap_or(false)
        })
        .max_by_key(|path| {
            path.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}

/// Resolve the model path: an explicit path wins, otherwise latest-by-mtime
/// in `dir`.
pub fn resolve_model_path(dir: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_latest_model(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::NUM_FEATURES;
    use crate::ml::trainer::{Trainer, TrainingParams};
    use ndarray::Array2;

    fn small_model() -> TrainedModel {
        let n = 120;
        let mut x = Array2::<f32>::zeros((n, NUM_FEATURES));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let positive = i % 2 == 0;
            x[[i, 0]] = if positive { 75.0 } else { 25.0 };
            y.push(positive as u8);
        }
        Trainer::new(TrainingParams::lightweight()).fit(&x, &y).unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = small_model();
        save_model(&model, &path).unwrap();

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.num_features, NUM_FEATURES);

        let mut probe = Array2::<f32>::zeros((1, NUM_FEATURES));
        probe[[0, 0]] = 75.0;
        let original = model.predict_probabilities(&probe);
        let reloaded = loaded.predict_probabilities(&probe);
        assert_eq!(original, reloaded);
    }

    #[test]
    fn test_find_latest_model_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let model = small_model();

        let older = dir.path().join("model_a.json");
        save_model(&model, &older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let newer = dir.path().join("model_b.json");
        save_model(&model, &newer).unwrap();

        assert_eq!(find_latest_model(dir.path()), Some(newer));
    }

    #[test]
    fn test_find_latest_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a model").unwrap();
        assert_eq!(find_latest_model(dir.path()), None);
    }

    #[test]
    fn test_missing_directory_is_none() {
        assert_eq!(find_latest_model(Path::new("/no/such/dir")), None);
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = PathBuf::from("chosen.json");
        assert_eq!(
            resolve_model_path(dir.path(), Some(&explicit)),
            Some(explicit)
        );
    }
}
