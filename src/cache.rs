use parking_lot::Mutex;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AnalyzerConfig;
use crate::encoder::Vocabulary;
use crate::error::Result;
use crate::model::{ModelVariant, Predictor, RecurrentNetwork};

/// Where models and the vocabulary come from
pub trait ModelSource: Send + Sync {
  /// Artifacts the variant needs that are not present
  fn missing_artifacts(&self, variant: ModelVariant) -> Vec<PathBuf>;
  fn load_model(&self, variant: ModelVariant) -> Result<Arc<dyn Predictor>>;
  fn load_vocabulary(&self) -> Result<Arc<Vocabulary>>;
}

/// Reads safetensors checkpoints and the bincode vocabulary from disk
#[derive(Debug, Clone)]
pub struct FileModelSource {
  config: AnalyzerConfig,
}

impl FileModelSource {
  pub fn new(config: AnalyzerConfig) -> Self {
    Self { config }
  }
}

impl ModelSource for FileModelSource {
  fn missing_artifacts(&self, variant: ModelVariant) -> Vec<PathBuf> {
    [self.config.weights_path(variant), self.config.vocabulary_path()]
      .into_iter()
      .filter(|p| !p.is_file())
      .collect()
  }

  fn load_model(&self, variant: ModelVariant) -> Result<Arc<dyn Predictor>> {
    let network: RecurrentNetwork = RecurrentNetwork::load(&self.config.weights_path(variant), variant)?;
    Ok(Arc::new(network))
  }

  fn load_vocabulary(&self) -> Result<Arc<Vocabulary>> {
    Ok(Arc::new(Vocabulary::load(&self.config.vocabulary_path())?))
  }
}

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

/// Artifact Cache
/// Loads each variant and the vocabulary at most once per process. Every
/// slot has its own lock, so concurrent first requests for one variant wait
/// for a single load while other variants proceed. A failed load leaves the
/// slot empty; a successful one is never replaced.
pub struct ArtifactCache<S: ModelSource> {
  source: S,
  models: Mutex<HashMap<ModelVariant, Slot<dyn Predictor>>>,
  vocabulary: Mutex<Option<Arc<Vocabulary>>>,
}

impl<S: ModelSource> ArtifactCache<S> {
  pub fn new(source: S) -> Self {
    Self {
      source,
      models: Mutex::new(HashMap::new()),
      vocabulary: Mutex::new(None),
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn model(&self, variant: ModelVariant) -> Result<Arc<dyn Predictor>> {
    let slot: Slot<dyn Predictor> = {
      let mut models = self.models.lock();
      Arc::clone(models.entry(variant).or_insert_with(|| Arc::new(Mutex::new(None))))
    };

    let mut loaded = slot.lock();
    if let Some(model) = loaded.as_ref() {
      return Ok(Arc::clone(model));
    }
    tracing::debug!(%variant, "loading model");
    let model: Arc<dyn Predictor> = self.source.load_model(variant)?;
    *loaded = Some(Arc::clone(&model));
    Ok(model)
  }

  pub fn vocabulary(&self) -> Result<Arc<Vocabulary>> {
    let mut loaded = self.vocabulary.lock();
    if let Some(vocabulary) = loaded.as_ref() {
      return Ok(Arc::clone(vocabulary));
    }
    tracing::debug!("loading vocabulary");
    let vocabulary: Arc<Vocabulary> = self.source.load_vocabulary()?;
    *loaded = Some(Arc::clone(&vocabulary));
    Ok(vocabulary)
  }

  pub fn is_loaded(&self, variant: ModelVariant) -> bool {
    self.models.lock().get(&variant).map_or(false, |slot| slot.lock().is_some())
  }
}
