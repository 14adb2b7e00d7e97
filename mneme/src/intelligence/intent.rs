/// Which extra retrieval a turn gets. Heuristic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Document,
    Web,
    None,
}

const DOCUMENT_CUES: &[&str] = &["pdf", "document", "file"];

const WEB_CUES: &[&str] = &[
    "latest", "today", "news", "current", "who is", "what is", "when is", "where is",
];

/// Lowercased substring match. Document cues win over web cues.
pub fn classify(text: &str) -> Intent {
    let text = text.to_lowercase();

    if DOCUMENT_CUES.iter().any(|cue| text.contains(cue)) {
        Intent::Document
    } else if WEB_CUES.iter().any(|cue| text.contains(cue)) {
        Intent::Web
    } else {
        Intent::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_cues() {
        assert_eq!(classify("Summarize this PDF"), Intent::Document);
        assert_eq!(classify("what's in the attached file?"), Intent::Document);
    }

    #[test]
    fn test_web_cues() {
        assert_eq!(classify("Latest news on Rust 2024"), Intent::Web);
        assert_eq!(classify("Who is the CEO of Mozilla?"), Intent::Web);
    }

    #[test]
    fn test_document_wins_over_web() {
        assert_eq!(classify("What is in this document?"), Intent::Document);
    }

    #[test]
    fn test_no_cue() {
        assert_eq!(classify("Tell me a joke"), Intent::None);
        assert_eq!(classify(""), Intent::None);
    }
}
