use chrono::FixedOffset;
use hl_core::ArticleStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    /// Offset query dates are interpreted in.
    pub offset: FixedOffset,
    feedback_path: PathBuf,
    /// Serializes appends to the feedback log.
    pub(crate) feedback_lock: Mutex<()>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>, feedback_path: PathBuf, offset: FixedOffset) -> Self {
        Self {
            store,
            offset,
            feedback_path,
            feedback_lock: Mutex::new(()),
        }
    }

    pub fn feedback_path(&self) -> &Path {
        &self.feedback_path
    }
}
