use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::combiner::BlendWeights;
use crate::encoder::SENTENCE_SIZE;
use crate::error::{AnalysisError, Result};
use crate::model::ModelVariant;

/// File names of the three weight checkpoints, relative to `artifact_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightFiles {
  pub lstm: PathBuf,
  pub bi_lstm: PathBuf,
  pub gru: PathBuf,
}

impl Default for WeightFiles {
  fn default() -> Self {
    Self {
      lstm: PathBuf::from("model_LSTM.safetensors"),
      bi_lstm: PathBuf::from("model_BI_LSTM.safetensors"),
      gru: PathBuf::from("model_GRU.safetensors"),
    }
  }
}

/// Analyzer Config
/// Where the artifacts live and the literal scoring constants. Every field
/// has a default, so an empty TOML file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
  pub artifact_dir: PathBuf,
  pub weights: WeightFiles,
  pub vocabulary_file: PathBuf,
  pub max_len: usize,
  pub blend: BlendWeights,
  pub default_model: ModelVariant,
  pub lexicon_file: Option<PathBuf>,
  pub stopwords_file: Option<PathBuf>,
  pub root_words_file: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
  fn default() -> Self {
    Self {
      artifact_dir: PathBuf::from("."),
      weights: WeightFiles::default(),
      vocabulary_file: PathBuf::from("tokenizer.bin"),
      max_len: SENTENCE_SIZE,
      blend: BlendWeights::default(),
      default_model: ModelVariant::default(),
      lexicon_file: None,
      stopwords_file: None,
      root_words_file: None,
    }
  }
}

impl AnalyzerConfig {
  pub fn from_file(path: &Path) -> Result<Self> {
    let content: String = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
    let config: AnalyzerConfig = toml::from_str(&content)
      .map_err(|e| AnalysisError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.max_len == 0 {
      return Err(AnalysisError::Config("max_len must be greater than 0".into()));
    }
    let BlendWeights { model, keyword } = self.blend;
    if !(model.is_finite() && keyword.is_finite()) || model < 0.0 || keyword < 0.0 {
      return Err(AnalysisError::Config("blend weights must be finite and non-negative".into()));
    }
    if ((model + keyword) - 1.0).abs() > 1e-9 {
      return Err(AnalysisError::Config(format!("blend weights must sum to 1, got {}", model + keyword)));
    }
    Ok(())
  }

  pub fn weights_path(&self, variant: ModelVariant) -> PathBuf {
    let file: &Path = match variant {
      ModelVariant::Lstm => &self.weights.lstm,
      ModelVariant::BiLstm => &self.weights.bi_lstm,
      ModelVariant::Gru => &self.weights.gru,
    };
    self.artifact_dir.join(file)
  }

  pub fn vocabulary_path(&self) -> PathBuf {
    self.artifact_dir.join(&self.vocabulary_file)
  }
}
