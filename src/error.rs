use serde::Serialize;
use thiserror::Error;

use std::fmt;
use std::path::PathBuf;

use crate::model::ModelVariant;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Analysis Error
/// Failures that stop a request or a tool command. Conditions the pipeline can
/// recover from are reported as `AnalysisWarning` instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
  #[error("input text is empty")]
  EmptyInput,

  #[error("artifact not found: {}", path.display())]
  MissingArtifact { path: PathBuf },

  #[error("failed to access {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid vocabulary artifact: {0}")]
  Vocabulary(String),

  #[error("invalid weights artifact {}: {message}", path.display())]
  Weights { path: PathBuf, message: String },

  #[error("shape mismatch: {0}")]
  ShapeMismatch(String),

  #[error("prediction with {variant} failed: {source}")]
  Prediction {
    variant: ModelVariant,
    #[source]
    source: Box<AnalysisError>,
  },

  #[error("tokenization failed: {0}")]
  Tokenization(String),

  #[error("invalid lexicon: {0}")]
  Lexicon(String),

  #[error("unknown model variant '{0}' (expected LSTM, BI-LSTM or GRU)")]
  UnknownModel(String),

  #[error("configuration error: {0}")]
  Config(String),

  #[error(transparent)]
  Csv(#[from] csv::Error),
}

impl AnalysisError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

/// Analysis Warning
/// Non-fatal conditions raised while a result is still produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
  /// Weights or vocabulary absent; the request fell back to keywords only.
  MissingArtifacts { variant: ModelVariant, paths: Vec<PathBuf> },
  /// Artifacts exist but could not be loaded.
  ArtifactLoad { variant: ModelVariant, reason: String },
  /// No token survived the vocabulary lookup and the model saw `[0]`.
  UnrecognizedTokens { variant: ModelVariant },
}

impl fmt::Display for AnalysisWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MissingArtifacts { paths, .. } => {
        let names: Vec<String> = paths.iter().map(|p| format!("'{}'", p.display())).collect();
        write!(f, "artifacts not found: {}; using keyword analysis only", names.join(", "))
      }
      Self::ArtifactLoad { variant, reason } => {
        write!(f, "could not load {} artifacts ({}); using keyword analysis only", variant, reason)
      }
      Self::UnrecognizedTokens { variant } => {
        write!(f, "no word in the text is known to the {} model; its prediction may be unreliable", variant)
      }
    }
  }
}
