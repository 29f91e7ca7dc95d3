use serde::{Deserialize, Serialize};

use std::fmt;

use crate::lexicon::{KeywordMatch, KeywordSentiment};

pub const MODEL_WEIGHT: f64 = 0.3;
pub const KEYWORD_WEIGHT: f64 = 0.7;
pub const POSITIVE_THRESHOLD: f64 = 0.5;

/// Blend Weights
/// Share of the model and keyword signals in the final score. The keyword
/// signal dominates by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
  pub model: f64,
  pub keyword: f64,
}

impl Default for BlendWeights {
  fn default() -> Self {
    Self { model: MODEL_WEIGHT, keyword: KEYWORD_WEIGHT }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
  #[serde(rename = "Positif")]
  Positive,
  #[serde(rename = "Negatif")]
  Negative,
}

impl Label {
  /// Exact threshold: a score of 0.5 is positive
  pub fn from_score(score: f64) -> Self {
    if score >= POSITIVE_THRESHOLD {
      Self::Positive
    } else {
      Self::Negative
    }
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Positive => f.write_str("Positif"),
      Self::Negative => f.write_str("Negatif"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedResult {
  pub final_score: f64,
  pub label: Label,
  pub keyword_score: f64,
  pub keyword_sentiment: KeywordSentiment,
  pub model_score: Option<f64>,
}

/// Combine
/// Blends the model score into the keyword score when one is available;
/// without it the keyword score stands alone.
pub fn combine(keyword: &KeywordMatch, model_score: Option<f64>, weights: BlendWeights) -> CombinedResult {
  let keyword_score: f64 = keyword.score();
  let final_score: f64 = match model_score {
    Some(model) => weights.model * model + weights.keyword * keyword_score,
    None => keyword_score,
  };
  let final_score: f64 = final_score.clamp(0.0, 1.0);

  CombinedResult {
    final_score,
    label: Label::from_score(final_score),
    keyword_score,
    keyword_sentiment: keyword.sentiment(),
    model_score,
  }
}
