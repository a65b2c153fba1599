//! Custom vocabulary loaded from a user JSON file

use std::path::Path;

use serde::Deserialize;

/// Providers accept at most this many keyword hints
const MAX_KEYWORDS: usize = 50;

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    #[serde(default)]
    keywords: serde_json::Value,
}

/// Domain keywords passed as an opaque recognition hint to providers
/// that support one.
///
/// A missing or malformed file degrades to an empty vocabulary rather
/// than failing the session.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    keywords: Vec<String>,
}

impl Vocabulary {
    /// Create a vocabulary from a keyword list, applying the cap
    pub fn new(mut keywords: Vec<String>) -> Self {
        keywords.truncate(MAX_KEYWORDS);
        Self { keywords }
    }

    /// Load from a JSON file of the form `{"keywords": ["...", ...]}`.
    ///
    /// Any read or parse failure, and any `keywords` value that is not a
    /// list of strings, yields an empty vocabulary.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };

        let Ok(file) = serde_json::from_str::<VocabularyFile>(&content) else {
            return Self::default();
        };

        let keywords = match file.keywords {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        Self::new(keywords)
    }

    /// The keyword list
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whether any keywords are configured
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Restore canonical keyword casing in `text`.
    ///
    /// Providers often lowercase proper nouns; this pass replaces every
    /// case-insensitive whole-word match of a keyword with the casing
    /// from the vocabulary file.
    pub fn apply_casing(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());

        for word in split_keeping_separators(text) {
            if word.chars().any(char::is_alphanumeric) {
                match self
                    .keywords
                    .iter()
                    .find(|k| k.eq_ignore_ascii_case(word))
                {
                    Some(canonical) => result.push_str(canonical),
                    None => result.push_str(word),
                }
            } else {
                result.push_str(word);
            }
        }

        result
    }
}

/// Split text into alternating word and separator slices, preserving all
/// characters so the pieces re-concatenate to the original.
fn split_keeping_separators(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_word = None;

    for (i, c) in text.char_indices() {
        let is_word = c.is_alphanumeric() || c == '_' || c == '-';
        match in_word {
            None => in_word = Some(is_word),
            Some(current) if current != is_word => {
                pieces.push(&text[start..i]);
                start = i;
                in_word = Some(is_word);
            }
            _ => {}
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_is_empty() {
        let vocab = Vocabulary::load(Path::new("/nonexistent/vocab.json"));
        assert!(vocab.is_empty());
    }

    #[test]
    fn valid_json_is_parsed() {
        let file = write_temp(r#"{"keywords": ["Tokio", "Deepgram"]}"#);
        let vocab = Vocabulary::load(file.path());
        assert_eq!(vocab.keywords(), &["Tokio".to_string(), "Deepgram".to_string()]);
    }

    #[test]
    fn invalid_json_is_empty() {
        let file = write_temp("not valid json {");
        let vocab = Vocabulary::load(file.path());
        assert!(vocab.is_empty());
    }

    #[test]
    fn keywords_wrong_type_is_empty() {
        let file = write_temp(r#"{"keywords": "should-be-list"}"#);
        let vocab = Vocabulary::load(file.path());
        assert!(vocab.is_empty());
    }

    #[test]
    fn missing_keywords_key_is_empty() {
        let file = write_temp(r#"{"other": "data"}"#);
        let vocab = Vocabulary::load(file.path());
        assert!(vocab.is_empty());
    }

    #[test]
    fn keyword_cap_applies() {
        let keywords: Vec<String> = (0..100).map(|i| format!("word{}", i)).collect();
        let vocab = Vocabulary::new(keywords);
        assert_eq!(vocab.keywords().len(), MAX_KEYWORDS);
    }

    #[test]
    fn casing_restores_keywords() {
        let vocab = Vocabulary::new(vec!["Deepgram".into(), "PostgreSQL".into()]);
        let refined = vocab.apply_casing("we stream to deepgram and store in postgresql.");
        assert_eq!(refined, "we stream to Deepgram and store in PostgreSQL.");
    }

    #[test]
    fn casing_leaves_other_words_alone() {
        let vocab = Vocabulary::new(vec!["Rust".into()]);
        assert_eq!(vocab.apply_casing("trust the rust compiler"), "trust the Rust compiler");
    }

    #[test]
    fn casing_on_empty_vocab_is_identity() {
        let vocab = Vocabulary::default();
        let text = "unchanged, exactly: as-is!";
        assert_eq!(vocab.apply_casing(text), text);
    }
}
