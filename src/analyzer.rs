use serde::Serialize;
use tracing::{debug, warn};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{ArtifactCache, FileModelSource, ModelSource};
use crate::combiner::{combine, BlendWeights, CombinedResult, Label};
use crate::config::AnalyzerConfig;
use crate::encoder::{EncodedSequence, SequenceEncoder, Vocabulary};
use crate::error::{AnalysisError, AnalysisWarning, Result};
use crate::lexicon::{KeywordLexicon, KeywordMatch};
use crate::model::{ModelVariant, Predictor};
use crate::preprocessing::{default_stop_words, IndonesianStemmer, NormalizedText, TextNormalizer};

/// Outcome of one request. Never stored; rendered and dropped.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
  pub variant: ModelVariant,
  #[serde(flatten)]
  pub combined: CombinedResult,
  pub keywords: KeywordMatch,
  /// Normalizer output, present when the model ran
  pub processed: Option<NormalizedText>,
  pub warnings: Vec<AnalysisWarning>,
  /// Words for a word-cloud consumer
  pub display_tokens: Vec<String>,
}

impl Analysis {
  pub fn label(&self) -> Label {
    self.combined.label
  }

  pub fn score(&self) -> f64 {
    self.combined.final_score
  }

  /// Token counts, most frequent first, ties alphabetical
  pub fn word_frequencies(&self) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &self.display_tokens {
      *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut frequencies: Vec<(String, usize)> = counts.into_iter().map(|(w, c)| (w.to_string(), c)).collect();
    frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    frequencies
  }
}

/// Analyzer
/// Keyword scan, optional model prediction and blending for one text
pub struct Analyzer<S: ModelSource = FileModelSource> {
  lexicon: KeywordLexicon,
  normalizer: TextNormalizer,
  encoder: SequenceEncoder,
  blend: BlendWeights,
  cache: ArtifactCache<S>,
}

impl Analyzer<FileModelSource> {
  /// Builds the analyzer the config describes, reading artifacts from disk
  pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
    config.validate()?;

    let lexicon: KeywordLexicon = match &config.lexicon_file {
      Some(path) => KeywordLexicon::from_csv(path)?,
      None => KeywordLexicon::default(),
    };
    let stop_words: HashSet<String> = match &config.stopwords_file {
      Some(path) => TextNormalizer::load_stop_words(path)?,
      None => default_stop_words(),
    };
    let stemmer: IndonesianStemmer = match &config.root_words_file {
      Some(path) => IndonesianStemmer::with_root_file(path)?,
      None => IndonesianStemmer::default(),
    };
    let normalizer: TextNormalizer = TextNormalizer::new(stop_words, Box::new(stemmer))?;

    Ok(Self::new(lexicon, normalizer, config, FileModelSource::new(config.clone())))
  }
}

impl<S: ModelSource> Analyzer<S> {
  pub fn new(lexicon: KeywordLexicon, normalizer: TextNormalizer, config: &AnalyzerConfig, source: S) -> Self {
    Self {
      lexicon,
      normalizer,
      encoder: SequenceEncoder::new(config.max_len),
      blend: config.blend,
      cache: ArtifactCache::new(source),
    }
  }

  pub fn lexicon(&self) -> &KeywordLexicon {
    &self.lexicon
  }

  pub fn normalizer(&self) -> &TextNormalizer {
    &self.normalizer
  }

  pub fn cache(&self) -> &ArtifactCache<S> {
    &self.cache
  }

  /// Analyze
  /// Runs the full pipeline for `text`. Missing or unreadable artifacts
  /// degrade to keyword-only scoring with a warning; blank input and
  /// prediction failures are errors.
  pub fn analyze(&self, text: &str, variant: ModelVariant) -> Result<Analysis> {
    if text.trim().is_empty() {
      return Err(AnalysisError::EmptyInput);
    }

    let mut warnings: Vec<AnalysisWarning> = vec!();
    let missing = self.cache.source().missing_artifacts(variant);
    let model_available: bool = missing.is_empty();
    if !model_available {
      let warning = AnalysisWarning::MissingArtifacts { variant, paths: missing };
      warn!(%variant, "{}", warning);
      warnings.push(warning);
    }

    debug!("scanning keywords");
    let keywords: KeywordMatch = self.lexicon.scan(text);

    let mut model_score: Option<f64> = None;
    let mut processed: Option<NormalizedText> = None;
    if model_available {
      match self.load(variant) {
        Ok((model, vocabulary)) => {
          let normalized: NormalizedText = self.normalizer.normalize(text)?;
          let encoded: EncodedSequence = self.encoder.encode(&vocabulary, &normalized.text);
          if encoded.fallback {
            let warning = AnalysisWarning::UnrecognizedTokens { variant };
            warn!(%variant, "{}", warning);
            warnings.push(warning);
          }

          debug!(%variant, "predicting");
          let y_hat: f32 = model
            .predict(&encoded.ids)
            .map_err(|e| AnalysisError::Prediction { variant, source: Box::new(e) })?;
          model_score = Some(f64::from(y_hat));
          processed = Some(normalized);
        }
        Err(e) => {
          let warning = AnalysisWarning::ArtifactLoad { variant, reason: e.to_string() };
          warn!(%variant, "{}", warning);
          warnings.push(warning);
        }
      }
    }

    let combined: CombinedResult = combine(&keywords, model_score, self.blend);
    let display_tokens: Vec<String> = match &processed {
      Some(normalized) => normalized.tokens.clone(),
      None => text.to_lowercase().split_whitespace().map(String::from).collect(),
    };
    debug!(score = combined.final_score, label = %combined.label, "analysis complete");

    Ok(Analysis { variant, combined, keywords, processed, warnings, display_tokens })
  }

  /// Analyzes every text independently; one failure does not stop the rest
  pub fn analyze_batch<I, T>(&self, texts: I, variant: ModelVariant) -> Vec<Result<Analysis>>
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    texts.into_iter().map(|t| self.analyze(t.as_ref(), variant)).collect()
  }

  fn load(&self, variant: ModelVariant) -> Result<(Arc<dyn Predictor>, Arc<Vocabulary>)> {
    let model: Arc<dyn Predictor> = self.cache.model(variant)?;
    let vocabulary: Arc<Vocabulary> = self.cache.vocabulary()?;
    Ok((model, vocabulary))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::tests::CountingSource;
  use crate::lexicon::KeywordSentiment;
  use approx::assert_relative_eq;

  use std::sync::atomic::Ordering;

  fn analyzer(source: CountingSource) -> Analyzer<CountingSource> {
    Analyzer::new(
      KeywordLexicon::default(),
      TextNormalizer::indonesian().unwrap(),
      &AnalyzerConfig::default(),
      source,
    )
  }

  fn with_model(variant: ModelVariant, score: f32) -> CountingSource {
    let words: [&str; 4] = ["program", "bantu", "makan", "sehat"];
    CountingSource {
      scores: [(variant, score)].into_iter().collect(),
      vocabulary: Vocabulary::new(words.iter().enumerate().map(|(i, w)| (w.to_string(), i as u32 + 1)).collect(), None),
      ..Default::default()
    }
  }

  #[test]
  fn scenario_positive_keywords_without_model() {
    let analysis: Analysis = analyzer(CountingSource::default())
      .analyze("Program ini sangat membantu dan bisa membuat anak-anak sehat", ModelVariant::Lstm)
      .unwrap();

    for word in ["membantu", "bisa", "sehat"] {
      assert!(analysis.keywords.positive_hits.iter().any(|h| h == word));
    }
    assert!(analysis.keywords.negative_hits.is_empty());
    assert_eq!(analysis.score(), 1.0);
    assert_eq!(analysis.label(), Label::Positive);
  }

  #[test]
  fn scenario_negative_keywords_without_model() {
    let analysis: Analysis = analyzer(CountingSource::default())
      .analyze("Program ini korupsi dan mubazir, kualitasnya buruk", ModelVariant::Gru)
      .unwrap();

    for word in ["korupsi", "mubazir", "buruk"] {
      assert!(analysis.keywords.negative_hits.iter().any(|h| h == word));
    }
    assert!(analysis.keywords.positive_hits.is_empty());
    assert_eq!(analysis.score(), 0.0);
    assert_eq!(analysis.label(), Label::Negative);
  }

  #[test]
  fn scenario_no_keywords_resolves_to_positive() {
    let analysis: Analysis = analyzer(CountingSource::default())
      .analyze("Makan siang hari ini enak", ModelVariant::BiLstm)
      .unwrap();

    assert_eq!(analysis.score(), 0.5);
    assert_eq!(analysis.combined.keyword_sentiment, KeywordSentiment::Netral);
    assert_eq!(analysis.label(), Label::Positive);
  }

  #[test]
  fn scenario_model_outweighed_by_keywords() {
    // one positive and four negative hits give a keyword score of 0.2
    let analysis: Analysis = analyzer(with_model(ModelVariant::Gru, 0.9))
      .analyze("program sehat tapi korupsi, mubazir, buruk dan bikin sakit", ModelVariant::Gru)
      .unwrap();

    assert_relative_eq!(analysis.combined.keyword_score, 0.2, epsilon = 1e-12);
    assert_relative_eq!(analysis.score(), 0.41, epsilon = 1e-6);
    assert_eq!(analysis.label(), Label::Negative);
    assert!(analysis.warnings.is_empty());
    assert!(analysis.processed.is_some());
  }

  #[test]
  fn scenario_missing_artifact_warns_once() {
    let analysis: Analysis = analyzer(with_model(ModelVariant::Lstm, 0.9))
      .analyze("Anak-anak senang dan lahap makan", ModelVariant::BiLstm)
      .unwrap();

    assert_eq!(analysis.warnings.len(), 1);
    match &analysis.warnings[0] {
      AnalysisWarning::MissingArtifacts { variant, paths } => {
        assert_eq!(*variant, ModelVariant::BiLstm);
        assert!(paths[0].to_string_lossy().contains("BI-LSTM"));
      }
      other => panic!("unexpected warning {:?}", other),
    }
    assert_eq!(analysis.combined.model_score, None);
    assert_eq!(analysis.score(), 1.0);
    assert_eq!(analysis.display_tokens, vec!["anak-anak", "senang", "dan", "lahap", "makan"]);
  }

  #[test]
  fn unknown_words_fall_back_with_a_warning() {
    let analysis: Analysis = analyzer(with_model(ModelVariant::Lstm, 0.1))
      .analyze("Enak sekali", ModelVariant::Lstm)
      .unwrap();

    assert_eq!(analysis.warnings, vec![AnalysisWarning::UnrecognizedTokens { variant: ModelVariant::Lstm }]);
    assert_relative_eq!(analysis.score(), 0.3 * 0.1_f32 as f64 + 0.7 * 0.5, epsilon = 1e-9);
  }

  #[test]
  fn vocabulary_failure_degrades_to_keywords() {
    let source: CountingSource = CountingSource { fail_vocabulary: true, ..with_model(ModelVariant::Gru, 0.9) };
    let analysis: Analysis = analyzer(source).analyze("mantap", ModelVariant::Gru).unwrap();

    assert!(matches!(analysis.warnings.as_slice(), [AnalysisWarning::ArtifactLoad { .. }]));
    assert_eq!(analysis.score(), 1.0);
    assert!(analysis.processed.is_none());
  }

  #[test]
  fn blank_input_is_rejected() {
    let analyzer: Analyzer<CountingSource> = analyzer(CountingSource::default());
    assert!(matches!(analyzer.analyze("   \n", ModelVariant::Lstm), Err(AnalysisError::EmptyInput)));
  }

  #[test]
  fn models_are_loaded_once_across_requests() {
    let analyzer: Analyzer<CountingSource> = analyzer(with_model(ModelVariant::BiLstm, 0.7));
    let results: Vec<Result<Analysis>> =
      analyzer.analyze_batch(["makan sehat", "", "program bantu"], ModelVariant::BiLstm);

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(AnalysisError::EmptyInput)));
    assert!(results[2].is_ok());
    assert_eq!(analyzer.cache().source().model_loads.load(Ordering::SeqCst), 1);
    assert_eq!(analyzer.cache().source().vocabulary_loads.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn it_counts_word_frequencies() {
    let analysis: Analysis = analyzer(CountingSource::default())
      .analyze("enak enak sekali, sehat enak", ModelVariant::Lstm)
      .unwrap();
    let frequencies: Vec<(String, usize)> = analysis.word_frequencies();
    assert_eq!(frequencies[0], ("enak".to_string(), 3));
  }
}
