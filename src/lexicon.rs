use serde::{Deserialize, Serialize};

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{AnalysisError, Result};

pub const POSITIVE_WORDS: [&str; 15] = [
  "dukung", "kuat", "cerah", "meningkat", "sehat", "cerdas",
  "penting", "damping", "senang", "terima kasih", "bisa",
  "lahap", "baik", "mantap", "membantu",
];

pub const NEGATIVE_WORDS: [&str; 29] = [
  "gila", "najis", "mending", "jajan", "tentang", "tidak",
  "ketimbang", "bukan", "menghina", "belum", "tega", "malah",
  "sakit", "mubazir", "tolol", "korupsi", "bajingan", "kasian",
  "persetan", "tai", "sialan", "kasihan", "anjing", "goblok",
  "ironis", "konyol", "mampus", "bangsat", "buruk",
];

/// Keyword Lexicon
/// Two disjoint, lowercase term lists. Built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordLexicon {
  positive: Vec<String>,
  negative: Vec<String>,
}

impl Default for KeywordLexicon {
  fn default() -> Self {
    Self {
      positive: POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
      negative: NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
    }
  }
}

#[derive(Debug, Deserialize)]
struct LexiconRow {
  term: String,
  polarity: String,
}

impl KeywordLexicon {
  pub fn new<P, N>(positive: P, negative: N) -> Result<Self>
  where
    P: IntoIterator,
    P::Item: AsRef<str>,
    N: IntoIterator,
    N::Item: AsRef<str>,
  {
    let positive: Vec<String> = dedup_terms(positive);
    let negative: Vec<String> = dedup_terms(negative);

    let positive_set: HashSet<&str> = positive.iter().map(String::as_str).collect();
    if let Some(shared) = negative.iter().find(|t| positive_set.contains(t.as_str())) {
      return Err(AnalysisError::Lexicon(format!("term '{}' is both positive and negative", shared)));
    }

    Ok(Self { positive, negative })
  }

  /// Load From CSV
  /// Reads `term,polarity` rows where polarity is `positive` or `negative`
  pub fn from_csv(path: &Path) -> Result<Self> {
    let mut reader: csv::Reader<std::fs::File> = csv::Reader::from_path(path)?;
    let mut positive: Vec<String> = vec!();
    let mut negative: Vec<String> = vec!();

    for row in reader.deserialize() {
      let row: LexiconRow = row?;
      match row.polarity.trim().to_lowercase().as_str() {
        "positive" | "positif" => positive.push(row.term),
        "negative" | "negatif" => negative.push(row.term),
        other => {
          return Err(AnalysisError::Lexicon(format!("unknown polarity '{}' for term '{}'", other, row.term)));
        }
      }
    }

    let lexicon: KeywordLexicon = Self::new(positive, negative)?;
    tracing::info!(
      path = %path.display(),
      positive = lexicon.positive.len(),
      negative = lexicon.negative.len(),
      "loaded keyword lexicon"
    );
    Ok(lexicon)
  }

  pub fn positive(&self) -> &[String] {
    &self.positive
  }

  pub fn negative(&self) -> &[String] {
    &self.negative
  }

  /// Scan
  /// Case-insensitive substring search of every term, in lexicon order.
  /// A term is recorded once no matter how often it occurs.
  pub fn scan(&self, text: &str) -> KeywordMatch {
    let text_lower: String = text.to_lowercase();
    let hits = |terms: &[String]| -> Vec<String> {
      terms.iter().filter(|t| text_lower.contains(t.as_str())).cloned().collect()
    };

    KeywordMatch {
      positive_hits: hits(&self.positive),
      negative_hits: hits(&self.negative),
    }
  }
}

fn dedup_terms<I>(terms: I) -> Vec<String>
where
  I: IntoIterator,
  I::Item: AsRef<str>,
{
  let mut seen: HashSet<String> = HashSet::new();
  terms
    .into_iter()
    .map(|t| t.as_ref().trim().to_lowercase())
    .filter(|t| !t.is_empty())
    .filter(|t| seen.insert(t.clone()))
    .collect()
}

/// Keyword Score
/// Share of positive hits among all hits, 0.5 when nothing matched
pub fn keyword_score(positive_count: usize, negative_count: usize) -> f64 {
  let total: usize = positive_count + negative_count;
  if total == 0 {
    return 0.5;
  }
  positive_count as f64 / total as f64
}

/// Three-way verdict of the keyword scan on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeywordSentiment {
  Positif,
  Negatif,
  Netral,
}

impl fmt::Display for KeywordSentiment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name: &str = match self {
      Self::Positif => "Positif",
      Self::Negatif => "Negatif",
      Self::Netral => "Netral",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordMatch {
  pub positive_hits: Vec<String>,
  pub negative_hits: Vec<String>,
}

impl KeywordMatch {
  pub fn positive_count(&self) -> usize {
    self.positive_hits.len()
  }

  pub fn negative_count(&self) -> usize {
    self.negative_hits.len()
  }

  pub fn score(&self) -> f64 {
    keyword_score(self.positive_count(), self.negative_count())
  }

  pub fn sentiment(&self) -> KeywordSentiment {
    match self.positive_count().cmp(&self.negative_count()) {
      std::cmp::Ordering::Greater => KeywordSentiment::Positif,
      std::cmp::Ordering::Less => KeywordSentiment::Negatif,
      std::cmp::Ordering::Equal => KeywordSentiment::Netral,
    }
  }
}
