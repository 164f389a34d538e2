//! The session's live transform.

use tokio::sync::watch;

use matte_model::transform::{Transform, TransformPatch};

/// Owner of the one display-space [`Transform`] in a session.
///
/// Dependents hold a [`watch::Receiver`] from [`subscribe`](Self::subscribe)
/// and only ever care about the latest value, so intermediate updates may
/// be skipped. The model accepts any value; range clamping belongs to the
/// controls that produce patches.
#[derive(Debug)]
pub struct TransformModel {
    tx: watch::Sender<Transform>,
}

impl TransformModel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Transform::IDENTITY);
        Self { tx }
    }

    pub fn current(&self) -> Transform {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Transform> {
        self.tx.subscribe()
    }

    /// Merge `patch` into the transform. Subscribers are notified when any
    /// field actually changed.
    pub fn update(&self, patch: &TransformPatch) -> Transform {
        self.tx.send_if_modified(|current| {
            let next = current.merged(patch);
            if next == *current {
                return false;
            }
            *current = next;
            true
        });
        let current = self.current();
        tracing::debug!(?patch, ?current, "transform updated");
        current
    }

    /// Back to [`Transform::IDENTITY`]. Always notifies.
    pub fn reset(&self) -> Transform {
        self.tx.send_replace(Transform::IDENTITY);
        tracing::debug!("transform reset");
        Transform::IDENTITY
    }
}

impl Default for TransformModel {
    fn default() -> Self {
        Self::new()
    }
}
