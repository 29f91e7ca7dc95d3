use regex::Regex;
use serde::Serialize;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

use std::collections::HashSet;
use std::path::Path;

use crate::error::{AnalysisError, Result};

const STOPWORDS_ID: &str = include_str!("../data/stopwords_id.txt");
const ROOT_WORDS_ID: &str = include_str!("../data/root_words_id.txt");

const VOWELS: [char; 5] = ['a', 'i', 'u', 'e', 'o'];
const MAX_PREFIXES: usize = 3;

/// Reduces a word to its root form
pub trait Stemmer: Send + Sync {
  fn stem(&self, word: &str) -> String;
}

/// Indonesian Stemmer
/// Dictionary-confirmed affix stripping. Inflectional suffixes go first, then
/// derivational suffixes, then up to three prefixes with nasal restoration.
/// A word whose candidates never reach a known root is returned unchanged.
#[derive(Debug, Clone)]
pub struct IndonesianStemmer {
  roots: HashSet<String>,
}

impl Default for IndonesianStemmer {
  fn default() -> Self {
    Self::new(word_list(ROOT_WORDS_ID))
  }
}

impl IndonesianStemmer {
  pub fn new(roots: HashSet<String>) -> Self {
    Self { roots }
  }

  /// Builds the stemmer from the embedded roots plus the words in `path`
  pub fn with_root_file(path: &Path) -> Result<Self> {
    let extra: String = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
    let mut roots: HashSet<String> = word_list(ROOT_WORDS_ID);
    roots.extend(word_list(&extra));
    Ok(Self::new(roots))
  }

  fn is_root(&self, word: &str) -> bool {
    self.roots.contains(word)
  }

  fn strip_prefixes(&self, word: &str, depth: usize) -> Option<String> {
    if self.is_root(word) {
      return Some(word.to_string());
    }
    if depth == MAX_PREFIXES {
      return None;
    }
    prefix_candidates(word)
      .into_iter()
      .filter(|c| c.chars().count() >= 2)
      .find_map(|c| self.strip_prefixes(&c, depth + 1))
  }
}

impl Stemmer for IndonesianStemmer {
  fn stem(&self, word: &str) -> String {
    if word.chars().count() <= 3 || self.is_root(word) {
      return word.to_string();
    }

    // reduplication: "anak-anak" -> "anak"
    if let Some((head, tail)) = word.split_once('-') {
      if head == tail {
        return self.stem(head);
      }
    }

    let mut inflected: Vec<&str> = vec![word];
    let without_particle: &str = strip_any_suffix(word, &["lah", "kah", "tah", "pun"]);
    inflected.push(without_particle);
    inflected.push(strip_any_suffix(without_particle, &["nya", "ku", "mu"]));

    for base in inflected {
      if self.is_root(base) {
        return base.to_string();
      }
      let mut bases: Vec<&str> = vec![base];
      for suffix in ["kan", "an", "i"] {
        if let Some(stripped) = base.strip_suffix(suffix) {
          bases.push(stripped);
        }
      }
      if let Some(root) = bases.into_iter().find_map(|b| self.strip_prefixes(b, 0)) {
        return root;
      }
    }

    word.to_string()
  }
}

fn strip_any_suffix<'a>(word: &'a str, suffixes: &[&str]) -> &'a str {
  suffixes
    .iter()
    .find_map(|s| word.strip_suffix(s))
    .filter(|rest| rest.chars().count() >= 3)
    .unwrap_or(word)
}

fn starts_with_any(word: &str, letters: &[char]) -> bool {
  word.chars().next().map_or(false, |c| letters.contains(&c))
}

/// Every root the first prefix of `word` could have hidden
fn prefix_candidates(word: &str) -> Vec<String> {
  let mut out: Vec<String> = vec!();

  for plain in ["di", "ke", "se", "ter", "ber", "per"] {
    if let Some(rest) = word.strip_prefix(plain) {
      out.push(rest.to_string());
    }
  }
  // bel-ajar, pel-ajar
  for lateral in ["bel", "pel"] {
    if let Some(rest) = word.strip_prefix(lateral) {
      out.push(rest.to_string());
    }
  }

  for velar in ["meng", "peng"] {
    if let Some(rest) = word.strip_prefix(velar) {
      out.push(rest.to_string());
      if starts_with_any(rest, &VOWELS) {
        out.push(format!("k{}", rest));
      }
    }
  }
  for nasal in ["meny", "peny"] {
    if let Some(rest) = word.strip_prefix(nasal) {
      if starts_with_any(rest, &VOWELS) {
        out.push(format!("s{}", rest));
      }
    }
  }
  for nasal in ["mem", "pem"] {
    if let Some(rest) = word.strip_prefix(nasal) {
      if starts_with_any(rest, &['b', 'f', 'v', 'p']) {
        out.push(rest.to_string());
      } else if starts_with_any(rest, &VOWELS) {
        out.push(format!("p{}", rest));
      }
    }
  }
  for nasal in ["men", "pen"] {
    if let Some(rest) = word.strip_prefix(nasal) {
      if starts_with_any(rest, &['c', 'd', 'j', 't', 'z', 's']) {
        out.push(rest.to_string());
      } else if starts_with_any(rest, &VOWELS) {
        out.push(format!("t{}", rest));
        out.push(format!("n{}", rest));
      }
    }
  }
  for bare in ["me", "pe"] {
    if let Some(rest) = word.strip_prefix(bare) {
      if starts_with_any(rest, &['l', 'm', 'n', 'r', 'w', 'y']) {
        out.push(rest.to_string());
      }
    }
  }

  out
}

fn word_list(source: &str) -> HashSet<String> {
  source
    .lines()
    .map(|l| l.trim().to_lowercase())
    .filter(|l| !l.is_empty() && !l.starts_with('#'))
    .collect()
}

/// Output of the normalizer: stemmed tokens and their space-joined form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedText {
  pub text: String,
  pub tokens: Vec<String>,
}

/// Text Normalizer
/// Lowercases, strips links, mentions, hashtags, punctuation and digits,
/// tokenizes, drops stopwords and stems what remains
pub struct TextNormalizer {
  url_regex: Regex,
  mention_regex: Regex,
  hashtag_regex: Regex,
  punctuation_regex: Regex,
  digit_regex: Regex,
  stop_words: HashSet<String>,
  stemmer: Box<dyn Stemmer>,
}

impl TextNormalizer {
  pub fn new(stop_words: HashSet<String>, stemmer: Box<dyn Stemmer>) -> Result<Self> {
    let compile = |pattern: &str| -> Result<Regex> {
      Regex::new(pattern).map_err(|e| AnalysisError::Tokenization(e.to_string()))
    };

    Ok(Self {
      url_regex: compile(r"http\S+")?,
      mention_regex: compile(r"@\w+")?,
      hashtag_regex: compile(r"#\w+")?,
      punctuation_regex: compile(r"[^\w\s]")?,
      digit_regex: compile(r"\d+")?,
      stop_words,
      stemmer,
    })
  }

  /// Normalizer with the embedded Indonesian stopwords and stemmer
  pub fn indonesian() -> Result<Self> {
    Self::new(default_stop_words(), Box::new(IndonesianStemmer::default()))
  }

  /// Replaces the embedded stopword list with the words in `path`
  pub fn load_stop_words(path: &Path) -> Result<HashSet<String>> {
    let source: String = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
    Ok(word_list(&source))
  }

  pub fn normalize(&self, text: &str) -> Result<NormalizedText> {
    let text: String = text.to_lowercase();
    let text = self.url_regex.replace_all(&text, "");
    let text = self.mention_regex.replace_all(&text, "");
    let text = self.hashtag_regex.replace_all(&text, "");
    let text = self.punctuation_regex.replace_all(&text, "");
    let text = self.digit_regex.replace_all(&text, "");

    let tokens: Vec<String> = self
      .tokenize(&text)?
      .into_iter()
      .filter(|t| !self.stop_words.contains(t))
      .map(|t| self.stemmer.stem(&t))
      .collect();

    tracing::debug!(tokens = tokens.len(), "normalized text");
    Ok(NormalizedText { text: tokens.join(" "), tokens })
  }

  fn tokenize(&self, text: &str) -> Result<Vec<String>> {
    let mut pretokenized: PreTokenizedString = PreTokenizedString::from(text);
    Whitespace::default()
      .pre_tokenize(&mut pretokenized)
      .map_err(|e| AnalysisError::Tokenization(e.to_string()))?;

    Ok(
      pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(token, _, _)| token.to_string())
        .collect(),
    )
  }
}

pub fn default_stop_words() -> HashSet<String> {
  word_list(STOPWORDS_ID)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn it_stems_common_affixes() {
    let stemmer: IndonesianStemmer = IndonesianStemmer::default();
    let cases: [(&str, &str); 12] = [
      ("membantu", "bantu"),
      ("makanannya", "makan"),
      ("meningkat", "tingkat"),
      ("pendidikan", "didik"),
      ("mengajar", "ajar"),
      ("menyapu", "sapu"),
      ("memakai", "pakai"),
      ("menulis", "tulis"),
      ("pelajaran", "ajar"),
      ("dukungan", "dukung"),
      ("anak-anak", "anak"),
      ("sekolahlah", "sekolah"),
    ];
    for (word, root) in cases {
      assert_eq!(stemmer.stem(word), root, "stemming {}", word);
    }
  }

  #[test]
  fn it_stems_general_vocabulary() {
    let stemmer: IndonesianStemmer = IndonesianStemmer::default();
    let cases: [(&str, &str); 16] = [
      ("terlambat", "lambat"),
      ("mendapatkan", "dapat"),
      ("dilaksanakan", "laksana"),
      ("kebijakan", "bijak"),
      ("pemerintah", "perintah"),
      ("keterlambatan", "lambat"),
      ("pembelajaran", "ajar"),
      ("perbaikan", "baik"),
      ("kesehatan", "sehat"),
      ("menggunakan", "guna"),
      ("disajikan", "saji"),
      ("kenaikan", "naik"),
      ("penjelasan", "jelas"),
      ("menangis", "tangis"),
      ("memukul", "pukul"),
      ("menyenangkan", "senang"),
    ];
    for (word, root) in cases {
      assert_eq!(stemmer.stem(word), root, "stemming {}", word);
    }
  }

  #[test]
  fn it_normalizes_a_complaint() {
    let normalizer: TextNormalizer = TextNormalizer::indonesian().unwrap();
    let out: NormalizedText = normalizer
      .normalize("Program makan bergizi di sekolah kami tidak berjalan dengan baik, makanannya sering terlambat dan kualitasnya buruk.")
      .unwrap();

    assert_eq!(out.tokens, vec!["program", "makan", "gizi", "sekolah", "jalan", "makan", "lambat", "kualitas", "buruk"]);
  }

  #[test]
  fn it_leaves_unknown_words_alone() {
    let stemmer: IndonesianStemmer = IndonesianStemmer::default();
    assert_eq!(stemmer.stem("anakanak"), "anakanak");
    assert_eq!(stemmer.stem("xyzkan"), "xyzkan");
    assert_eq!(stemmer.stem("tai"), "tai");
  }

  #[test]
  fn it_normalizes_text() {
    let normalizer: TextNormalizer = TextNormalizer::indonesian().unwrap();
    let out: NormalizedText = normalizer
      .normalize("Program MBG sangat membantu @menteri #gizi 2024 https://t.co/x makanannya sehat!!")
      .unwrap();

    assert_eq!(out.tokens, vec!["program", "mbg", "bantu", "makan", "sehat"]);
    assert_eq!(out.text, "program mbg bantu makan sehat");
  }

  #[test]
  fn it_normalizes_to_nothing() {
    let normalizer: TextNormalizer = TextNormalizer::indonesian().unwrap();
    let out: NormalizedText = normalizer.normalize("yang dan 123 !!! @someone").unwrap();
    assert!(out.tokens.is_empty());
    assert_eq!(out.text, "");
  }

  #[test]
  fn it_uses_custom_stop_words() {
    let stop_words: HashSet<String> = ["program"].iter().map(|w| w.to_string()).collect();
    let normalizer: TextNormalizer =
      TextNormalizer::new(stop_words, Box::new(IndonesianStemmer::new(HashSet::new()))).unwrap();
    let out: NormalizedText = normalizer.normalize("Program yang membantu").unwrap();
    assert_eq!(out.tokens, vec!["yang", "membantu"]);
  }
}
