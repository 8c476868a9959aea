use std::path::PathBuf;
use std::sync::Arc;

use crate::classifier::Classifier;
use crate::solution::SolutionProvider;

pub struct AppState {
    pub classifier: Classifier,
    pub solutions: Arc<dyn SolutionProvider>,
    /// Where uploads are written while they are being classified.
    pub upload_dir: PathBuf,
    pub body_limit_bytes: usize,
}

pub type SharedState = Arc<AppState>;
