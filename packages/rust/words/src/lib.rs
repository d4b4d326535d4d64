//! Word tokenization and frequency counting.
//!
//! Splitting rule: text is split on whitespace, `,` and `;`. Each piece is
//! lowercased and stripped of every non-alphabetic character; pieces left
//! empty are dropped. `"test-123"` therefore becomes `"test"`, while
//! `"a,b"` becomes two tokens.

use std::collections::HashMap;

use forumharvest_shared::WordFrequency;
use tracing::debug;

/// Lowercase a word and keep only its alphabetic characters.
pub fn clean_word(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphabetic())
        .collect()
}

/// Split text into cleaned, non-empty tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(clean_word)
        .filter(|w| !w.is_empty())
}

/// The text an article contributes to the word count.
pub fn article_text(title: &str, content: &str) -> String {
    format!("{title} {content}")
}

/// Occurrence counts keyed by cleaned token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFrequencies {
    counts: HashMap<String, u64>,
}

impl WordFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every token of every text.
    pub fn from_texts<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut freqs = Self::new();
        let mut docs = 0usize;
        for text in texts {
            freqs.add_text(text);
            docs += 1;
        }
        debug!(
            docs,
            distinct = freqs.len(),
            total = freqs.total(),
            "word frequencies counted"
        );
        freqs
    }

    /// Count the tokens of one text.
    pub fn add_text(&mut self, text: &str) {
        for token in tokenize(text) {
            self.add(token);
        }
    }

    /// Count one already-cleaned token.
    pub fn add(&mut self, token: String) {
        *self.counts.entry(token).or_insert(0) += 1;
    }

    /// Add another table's counts to this one.
    pub fn merge(&mut self, other: &WordFrequencies) {
        for (word, count) in &other.counts {
            *self.counts.entry(word.clone()).or_insert(0) += count;
        }
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.counts.get(word).copied()
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(w, c)| (w.as_str(), *c))
    }

    /// All pairs, most frequent first; equal counts ordered by word.
    pub fn sorted(&self) -> Vec<WordFrequency> {
        let mut pairs: Vec<WordFrequency> = self
            .counts
            .iter()
            .map(|(word, &frequency)| WordFrequency {
                word: word.clone(),
                frequency,
            })
            .collect();
        pairs.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.word.cmp(&b.word)));
        pairs
    }

    /// Distinct words in alphabetical order.
    pub fn distinct(&self) -> Vec<String> {
        let mut words: Vec<String> = self.counts.keys().cloned().collect();
        words.sort();
        words
    }
}

impl FromIterator<String> for WordFrequencies {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut freqs = Self::new();
        for token in iter {
            freqs.add(token);
        }
        freqs
    }
}
