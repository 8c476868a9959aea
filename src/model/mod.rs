use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::ModelError;
use crate::preprocess::ImageTensor;

#[cfg(feature = "tensorflow")]
mod frozen_graph;
#[cfg(feature = "tensorflow")]
pub use frozen_graph::{FrozenGraphModel, FrozenGraphSource};

/// A loaded classification model. Returns one probability per class.
pub trait Model: Send + Sync {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError>;
}

/// Knows how to produce a [`Model`]. Called at most once per successful load.
pub trait ModelSource: Send + Sync {
    fn load(&self) -> Result<Arc<dyn Model>, ModelError>;
}

impl<F> ModelSource for F
where
    F: Fn() -> Result<Arc<dyn Model>, ModelError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn Model>, ModelError> {
        self()
    }
}

/// Lazily loaded, process-wide model shared by every request.
///
/// Concurrent first calls to [`ModelHandle::get`] run a single load; a failed
/// load leaves the handle empty so the next call retries.
pub struct ModelHandle {
    source: Arc<dyn ModelSource>,
    model: OnceCell<Arc<dyn Model>>,
}

impl ModelHandle {
    pub fn new(source: Arc<dyn ModelSource>) -> Self {
        Self {
            source,
            model: OnceCell::new(),
        }
    }

    /// Wraps an already loaded model.
    pub fn loaded(model: Arc<dyn Model>) -> Self {
        let source: Arc<dyn ModelSource> = Arc::new(|| -> Result<Arc<dyn Model>, ModelError> {
            Err(ModelError::Load("model was provided preloaded".to_string()))
        });
        Self {
            source,
            model: OnceCell::new_with(Some(model)),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn Model>, ModelError> {
        self.model
            .get_or_try_init(|| async {
                tracing::debug!("Loading model...");
                let source = Arc::clone(&self.source);
                let model = tokio::task::spawn_blocking(move || source.load())
                    .await
                    .map_err(|e| ModelError::Load(e.to_string()))?;

                match &model {
                    Ok(_) => tracing::info!("Model loaded successfully"),
                    Err(e) => tracing::error!("Error loading model: {}", e),
                }
                model
            })
            .await
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }
}

/// Picks the first candidate that exists on disk.
///
/// The error names the first candidate since that is where the artifact is
/// expected to live.
pub fn resolve_model_path(candidates: &[PathBuf]) -> Result<PathBuf, ModelError> {
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let expected = candidates
        .first()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<no candidate paths>".to_string());
    Err(ModelError::NotFound(expected))
}

pub fn any_model_exists(candidates: &[PathBuf]) -> bool {
    candidates.iter().any(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedModel;

    impl Model for FixedModel {
        fn predict(&self, _input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
            Ok(vec![0.1, 0.2, 0.7])
        }
    }

    fn counting_source(loads: Arc<AtomicUsize>) -> Arc<dyn ModelSource> {
        Arc::new(move || -> Result<Arc<dyn Model>, ModelError> {
            loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(FixedModel))
        })
    }

    #[test]
    fn test_resolve_prefers_primary_path() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("models/potato_model.pb");
        let flat = dir.path().join("potato_model.pb");
        std::fs::create_dir_all(primary.parent().unwrap()).unwrap();
        std::fs::write(&primary, b"graph").unwrap();
        std::fs::write(&flat, b"graph").unwrap();

        let resolved = resolve_model_path(&[primary.clone(), flat]).unwrap();

        assert_eq!(resolved, primary);
    }

    #[test]
    fn test_resolve_falls_back_to_flat_path() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("models/potato_model.pb");
        let flat = dir.path().join("potato_model.pb");
        std::fs::write(&flat, b"graph").unwrap();

        let resolved = resolve_model_path(&[primary, flat.clone()]).unwrap();

        assert_eq!(resolved, flat);
    }

    #[test]
    fn test_resolve_reports_primary_path_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("models/potato_model.pb");
        let flat = dir.path().join("potato_model.pb");

        let err = resolve_model_path(&[primary.clone(), flat]).unwrap_err();

        match err {
            ModelError::NotFound(path) => assert_eq!(path, primary.display().to_string()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_gets_load_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = ModelHandle::new(counting_source(loads.clone()));

        assert!(!handle.is_loaded());
        let first = handle.get().await.unwrap();
        let second = handle.get().await.unwrap();

        assert!(handle.is_loaded());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_gets_load_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = Arc::new(ModelHandle::new(counting_source(loads.clone())));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                tokio::spawn(async move { handle.get().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let source: Arc<dyn ModelSource> =
            Arc::new(move || -> Result<Arc<dyn Model>, ModelError> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ModelError::NotFound("models/potato_model.pb".to_string()))
                } else {
                    Ok(Arc::new(FixedModel))
                }
            });
        let handle = ModelHandle::new(source);

        assert!(matches!(handle.get().await, Err(ModelError::NotFound(_))));
        assert!(!handle.is_loaded());
        assert!(handle.get().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preloaded_handle_reports_loaded() {
        let handle = ModelHandle::loaded(Arc::new(FixedModel));

        assert!(handle.is_loaded());
        let tensor = ImageTensor {
            data: vec![0.0; 3],
            height: 1,
            width: 1,
        };
        let probs = handle.get().await.unwrap().predict(&tensor).unwrap();
        assert_eq!(probs, vec![0.1, 0.2, 0.7]);
    }
}
