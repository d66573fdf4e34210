use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use super::{ModelLoadError, ScoringModel};

/// Process-wide holder of the active scoring model.
///
/// Readers clone the `Arc` and release the lock immediately, so a swap never
/// waits on inference and in-flight requests finish on the handle they took.
#[derive(Debug)]
pub struct ModelStore {
    current: RwLock<Arc<ScoringModel>>,
}

impl ModelStore {
    pub fn new(model: ScoringModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let model = ScoringModel::load(path)?;
        info!(path = %path.display(), version = model.version(), "scoring model loaded");
        Ok(Self::new(model))
    }

    pub fn current(&self) -> Arc<ScoringModel> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes `model` and returns the handle it replaced.
    pub fn swap(&self, model: ScoringModel) -> Arc<ScoringModel> {
        self.publish(Arc::new(model))
    }

    fn publish(&self, next: Arc<ScoringModel>) -> Arc<ScoringModel> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Loads a new artifact outside the lock, then publishes it. On failure the
    /// active model is left untouched. Returns the handle this call published.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<ScoringModel>, ModelLoadError> {
        let path = path.as_ref();
        let next = Arc::new(ScoringModel::load(path)?);
        let previous = self.publish(Arc::clone(&next));
        info!(
            path = %path.display(),
            previous = previous.version(),
            version = next.version(),
            "scoring model swapped"
        );
        Ok(next)
    }
}
