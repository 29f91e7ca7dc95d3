pub mod analyzer;
pub mod cache;
pub mod combiner;
pub mod config;
pub mod encoder;
pub mod error;
pub mod lexicon;
pub mod model;
pub mod preprocessing;

use std::sync::OnceLock;

pub use analyzer::{Analysis, Analyzer};
pub use combiner::{combine, BlendWeights, CombinedResult, Label};
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, AnalysisWarning, Result};
pub use lexicon::{keyword_score, KeywordLexicon, KeywordMatch, KeywordSentiment};
pub use model::{ModelVariant, Predictor};

static DEFAULT_ANALYZER: OnceLock<Analyzer> = OnceLock::new();

/// Sentiment Prediction
/// Classifies a sentence with the default configuration, reading artifacts
/// from the current directory. The analyzer and every model it loads live for
/// the rest of the process.
pub fn sentiment_prediction(sentence: &str, variant: ModelVariant) -> Result<Analysis> {
    let analyzer: &Analyzer = match DEFAULT_ANALYZER.get() {
        Some(analyzer) => analyzer,
        None => {
            let analyzer: Analyzer = Analyzer::from_config(&AnalyzerConfig::default())?;
            DEFAULT_ANALYZER.get_or_init(|| analyzer)
        }
    };
    analyzer.analyze(sentence, variant)
}
