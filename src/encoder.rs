use bincode::Options;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{AnalysisError, Result};

pub const SENTENCE_SIZE: usize = 100;

// Characters the training tokenizer filtered before splitting
const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Vocabulary
/// Token to id map the recurrent models were trained with. Ids start at 1,
/// 0 is reserved for padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
  pub word_index: HashMap<String, u32>,
  /// Only ids below this bound are emitted when set
  pub num_words: Option<usize>,
  pub lower: bool,
}

impl Vocabulary {
  pub fn new(word_index: HashMap<String, u32>, num_words: Option<usize>) -> Self {
    Self { word_index, num_words, lower: true }
  }

  /// Fit
  /// Ranks words by frequency across `texts`, ties kept in order of first
  /// appearance, and numbers them from 1
  pub fn fit<I, S>(texts: I, num_words: Option<usize>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut counts: Vec<(String, usize)> = vec!();
    let mut position: HashMap<String, usize> = HashMap::new();

    for text in texts {
      for word in split_words(text.as_ref(), true) {
        match position.get(&word) {
          Some(&i) => counts[i].1 += 1,
          None => {
            position.insert(word.clone(), counts.len());
            counts.push((word, 1));
          }
        }
      }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let word_index: HashMap<String, u32> = counts
      .into_iter()
      .enumerate()
      .map(|(i, (word, _))| (word, i as u32 + 1))
      .collect();

    tracing::info!(words = word_index.len(), "fitted vocabulary");
    Self::new(word_index, num_words)
  }

  pub fn load(path: &Path) -> Result<Self> {
    // length prefixes may not exceed the file size
    let bytes: Vec<u8> = std::fs::read(path).map_err(|e| AnalysisError::io(path, e))?;
    let vocabulary: Vocabulary = bincode::DefaultOptions::new()
      .with_fixint_encoding()
      .allow_trailing_bytes()
      .with_limit(bytes.len() as u64)
      .deserialize(&bytes)
      .map_err(|e| AnalysisError::Vocabulary(format!("{}: {}", path.display(), e)))?;

    if vocabulary.word_index.values().any(|&id| id == 0) {
      return Err(AnalysisError::Vocabulary(format!("{}: id 0 is reserved for padding", path.display())));
    }
    tracing::info!(path = %path.display(), words = vocabulary.word_index.len(), "loaded vocabulary");
    Ok(vocabulary)
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    let file: File = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
    bincode::serialize_into(BufWriter::new(file), self)
      .map_err(|e| AnalysisError::Vocabulary(format!("{}: {}", path.display(), e)))
  }

  pub fn len(&self) -> usize {
    self.word_index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.word_index.is_empty()
  }

  /// Text To Sequence
  /// Unknown words and ids at or above `num_words` are dropped
  pub fn text_to_sequence(&self, text: &str) -> Vec<u32> {
    split_words(text, self.lower)
      .into_iter()
      .filter_map(|w| self.word_index.get(&w).copied())
      .filter(|&id| self.num_words.map_or(true, |n| (id as usize) < n))
      .collect()
  }
}

fn split_words(text: &str, lower: bool) -> Vec<String> {
  let text: String = if lower { text.to_lowercase() } else { text.to_string() };
  text
    .chars()
    .map(|c| if FILTERS.contains(c) { ' ' } else { c })
    .collect::<String>()
    .split_whitespace()
    .map(String::from)
    .collect()
}

/// Pad Post
/// Cuts `ids` to `max_len` from the end, or appends zeros up to it
pub fn pad_post(mut ids: Vec<u32>, max_len: usize) -> Vec<u32> {
  ids.truncate(max_len);
  ids.resize(max_len, 0);
  ids
}

/// Fixed-length model input. `fallback` marks a text with no known word,
/// encoded as the sequence `[0]` before padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence {
  pub ids: Vec<u32>,
  pub fallback: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceEncoder {
  pub max_len: usize,
}

impl Default for SequenceEncoder {
  fn default() -> Self {
    Self { max_len: SENTENCE_SIZE }
  }
}

impl SequenceEncoder {
  pub fn new(max_len: usize) -> Self {
    Self { max_len }
  }

  pub fn encode(&self, vocabulary: &Vocabulary, cleaned_text: &str) -> EncodedSequence {
    let mut ids: Vec<u32> = vocabulary.text_to_sequence(cleaned_text);
    let fallback: bool = ids.is_empty();
    if fallback {
      ids = vec![0];
    }
    EncodedSequence { ids: pad_post(ids, self.max_len), fallback }
  }
}
