use std::path::Path;

use serde::Serialize;

use crate::error::{ClassifyError, ModelError};
use crate::model::ModelHandle;
use crate::preprocess::{preprocess_image, PreprocessConfig};

/// Raw model labels paired with their display names, in model output order.
pub const LABEL_MAP: [(&str, &str); 3] = [
    ("Potato___Early_blight", "Early Blight"),
    ("Potato___Late_blight", "Late Blight"),
    ("Potato___healthy", "Healthy"),
];

pub fn display_labels() -> Vec<&'static str> {
    LABEL_MAP.iter().map(|(_, display)| *display).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f64,
    pub raw_label: String,
    pub probs: Vec<f64>,
}

/// Index of the largest probability. Ties go to the earliest index.
pub fn argmax(probs: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probs.iter().enumerate() {
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

/// Probability as a percentage rounded to two decimals.
pub fn to_percent(prob: f32) -> f64 {
    (prob as f64 * 100.0 * 100.0).round() / 100.0
}

pub fn interpret(probabilities: &[f32]) -> Result<ClassificationResult, ClassifyError> {
    if probabilities.len() != LABEL_MAP.len() {
        return Err(ClassifyError::OutputShape {
            expected: LABEL_MAP.len(),
            actual: probabilities.len(),
        });
    }

    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
        let message = format!("model produced a non-finite probability: {bad}");
        return Err(ModelError::Inference(message).into());
    }

    let predicted = argmax(probabilities).ok_or(ClassifyError::OutputShape {
        expected: LABEL_MAP.len(),
        actual: 0,
    })?;
    let (raw_label, label) = LABEL_MAP[predicted];

    Ok(ClassificationResult {
        label: label.to_string(),
        confidence: to_percent(probabilities[predicted]),
        raw_label: raw_label.to_string(),
        probs: probabilities.iter().map(|&p| to_percent(p)).collect(),
    })
}

pub struct Classifier {
    model: ModelHandle,
    preprocess: PreprocessConfig,
}

impl Classifier {
    pub fn new(model: ModelHandle, preprocess: PreprocessConfig) -> Self {
        Self { model, preprocess }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub async fn classify_file(&self, path: &Path) -> Result<ClassificationResult, ClassifyError> {
        tracing::debug!("Attempting classification on {}", path.display());
        let image_data = tokio::fs::read(path).await?;
        self.classify_bytes(image_data).await
    }

    pub async fn classify_bytes(
        &self,
        image_data: Vec<u8>,
    ) -> Result<ClassificationResult, ClassifyError> {
        let model = self.model.get().await?;
        let config = self.preprocess;

        let probabilities = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, ClassifyError> {
            let tensor = preprocess_image(&image_data, &config)?;
            tracing::debug!("Running prediction...");
            Ok(model.predict(&tensor)?)
        })
        .await??;

        let result = interpret(&probabilities)?;
        tracing::debug!("Prediction result: {:?}", result);
        Ok(result)
    }
}
