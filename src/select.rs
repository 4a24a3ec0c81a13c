//! Pick a summarisation input from the staged articles.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use rand::{seq::SliceRandom, Rng};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{DigestError, Result};

/// Default number of documents tried before giving up.
pub const DEFAULT_SELECTION_ATTEMPTS: usize = 50;

static BACKGROUND_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Background.{0,1000}").expect("static pattern"));

/// The chosen document and the span extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedInput {
    pub source: PathBuf,
    pub text: String,
}

/// Collapse newlines, carriage returns and tabs into single spaces.
pub fn flatten_text(text: &str) -> String {
    text.replace(['\n', '\r', '\t'], " ")
}

/// First `Background` plus up to 1000 following characters.
pub fn find_background_span(flattened: &str) -> Option<&str> {
    BACKGROUND_SPAN.find(flattened).map(|m| m.as_str())
}

/// Draw staged documents at random until one contains the pattern.
pub fn select_input<R: Rng + ?Sized>(
    documents: &[PathBuf],
    rng: &mut R,
    max_attempts: usize,
) -> Result<SelectedInput> {
    for attempt in 1..=max_attempts {
        let Some(path) = documents.choose(&mut *rng) else {
            break;
        };
        let text = read_lossy(path)?;
        let flattened = flatten_text(&text);
        if let Some(span) = find_background_span(&flattened) {
            info!(path = %path.display(), attempt, chars = span.chars().count(), "selected summarisation input");
            return Ok(SelectedInput {
                source: path.clone(),
                text: span.to_string(),
            });
        }
        debug!(path = %path.display(), attempt, "no background section");
    }
    Err(DigestError::PatternNotFound {
        attempts: max_attempts,
    })
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn flattens_whitespace_controls() {
        assert_eq!(flatten_text("a\nb\tc\r\nd"), "a b c  d");
    }

    #[test]
    fn span_is_case_sensitive() {
        assert_eq!(find_background_span("no background here"), None);
        assert_eq!(
            find_background_span("Intro. Background: cells divide."),
            Some("Background: cells divide.")
        );
    }

    #[test]
    fn span_caps_at_thousand_characters() {
        let text = format!("Background{}", "é".repeat(1500));
        let span = find_background_span(&text).unwrap();
        assert_eq!(span.chars().count(), "Background".len() + 1000);
    }

    #[test]
    fn bounded_search_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "Methods only").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = select_input(&[path], &mut rng, 5).unwrap_err();
        assert!(matches!(err, DigestError::PatternNotFound { attempts: 5 }));
    }

    #[test]
    fn selects_span_from_matching_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "Title\nBackground\tGenes\nmatter.").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let selected = select_input(&[path.clone()], &mut rng, 3).unwrap();
        assert_eq!(selected.source, path);
        assert_eq!(selected.text, "Background Genes matter.");
    }

    #[test]
    fn empty_corpus_is_not_found() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_input(&[], &mut rng, 3).is_err());
    }
}
