use regex::Regex;

use crate::config::RagConfig;

/// Sentence-aware, word-counted chunker with overlap between chunks.
pub struct WordChunker {
    max_words: usize,
    overlap_words: usize,
    sentence: Option<Regex>,
}

impl WordChunker {
    pub fn new(max_words: usize, overlap_words: usize) -> Self {
        let max_words = max_words.max(1);
        Self {
            max_words,
            overlap_words: overlap_words.min(max_words - 1),
            sentence: Regex::new(r"[^.!?]+[.!?]+").ok(),
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_max_words, config.chunk_overlap_words)
    }

    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let Some(pattern) = &self.sentence else {
            return vec![text];
        };

        let mut sentences = Vec::new();
        let mut end = 0;
        for found in pattern.find_iter(text) {
            sentences.push(found.as_str());
            end = found.end();
        }
        // Trailing text without terminal punctuation is its own sentence.
        let rest = &text[end..];
        if !rest.trim().is_empty() {
            sentences.push(rest);
        }
        sentences
    }

    /// Splits `text` into chunks of at most `max_words` words. A chunk only
    /// exceeds the limit when a single sentence does.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut fresh = 0usize;

        for sentence in self.sentences(text) {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            if fresh > 0 && current.len() + words.len() > self.max_words {
                chunks.push(current.join(" "));
                let room = self.max_words.saturating_sub(words.len());
                let keep = self.overlap_words.min(room).min(current.len());
                current.drain(..current.len() - keep);
                fresh = 0;
            }

            current.extend(words);
            fresh += 1;
        }

        if fresh > 0 {
            chunks.push(current.join(" "));
        }

        chunks
    }
}

impl Default for WordChunker {
    fn default() -> Self {
        Self::new(500, 100)
    }
}
