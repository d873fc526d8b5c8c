//! The parts of a model's `config.json` the task pipelines read

use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const MULTI_LABEL_CLASSIFICATION: &str = "multi_label_classification";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_type: Option<String>,
    pub id2label: BTreeMap<usize, String>,
    pub label2id: BTreeMap<String, usize>,
    pub problem_type: Option<String>,
    /// Log-space temperature of CLIP-style similarity logits
    #[serde(alias = "logit_scale_init_value")]
    pub logit_scale: Option<f32>,
}

impl ModelConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Label for a class index, `LABEL_{i}` when the config has none
    pub fn label(&self, index: usize) -> String {
        self.id2label
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", index))
    }

    pub fn is_multi_label(&self) -> bool {
        self.problem_type.as_deref() == Some(MULTI_LABEL_CLASSIFICATION)
    }

    /// Class index of the first label (by index) whose lowercase name starts with `prefix`
    pub fn label_index_with_prefix(&self, prefix: &str) -> Option<usize> {
        let from_label2id = self
            .label2id
            .iter()
            .filter(|(label, _)| label.to_lowercase().starts_with(prefix))
            .map(|(_, &index)| index)
            .min();
        from_label2id.or_else(|| {
            self.id2label
                .iter()
                .find(|(_, label)| label.to_lowercase().starts_with(prefix))
                .map(|(&index, _)| index)
        })
    }

    /// Multiplier applied to cosine similarities, `exp(logit_scale)` or 100
    pub fn similarity_scale(&self) -> f32 {
        self.logit_scale.map(f32::exp).unwrap_or(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NER_CONFIG: &str = r#"{
        "model_type": "bert",
        "id2label": {"0": "O", "1": "B-MISC", "2": "I-MISC", "3": "B-PER", "4": "I-PER"},
        "label2id": {"O": 0, "B-MISC": 1, "I-MISC": 2, "B-PER": 3, "I-PER": 4},
        "hidden_size": 768
    }"#;

    #[test]
    fn test_parse_labels() {
        let config = ModelConfig::from_json(NER_CONFIG).unwrap();
        assert_eq!(config.model_type.as_deref(), Some("bert"));
        assert_eq!(config.label(3), "B-PER");
        assert_eq!(config.label(9), "LABEL_9");
        assert!(!config.is_multi_label());
    }

    #[test]
    fn test_nli_label_lookup() {
        let config = ModelConfig::from_json(
            r#"{"label2id": {"CONTRADICTION": 2, "ENTAILMENT": 0, "NEUTRAL": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.label_index_with_prefix("entail"), Some(0));
        assert_eq!(config.label_index_with_prefix("contra"), Some(2));
        assert_eq!(config.label_index_with_prefix("other"), None);
    }

    #[test]
    fn test_similarity_scale() {
        let config = ModelConfig::from_json(r#"{"logit_scale": 0.0}"#).unwrap();
        assert_eq!(config.similarity_scale(), 1.0);
        let clip = ModelConfig::from_json(r#"{"logit_scale_init_value": 2.0}"#).unwrap();
        assert!((clip.similarity_scale() - 2.0f32.exp()).abs() < 1e-5);
        assert_eq!(ModelConfig::default().similarity_scale(), 100.0);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(ModelConfig::from_json("{ not json").is_err());
    }
}
