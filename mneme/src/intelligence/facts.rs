use regex::Regex;

/// Pattern-based extraction of explicit self-disclosures ("my name is ...").
///
/// Pure and deterministic: each pattern contributes at most one statement,
/// in pattern order.
pub struct FactExtractor {
    patterns: Vec<(Regex, &'static str)>,
}

const PATTERNS: &[(&str, &str)] = &[
    (r"(?i)my name is (.+)", "User's name is"),
    (r"(?i)i like (.+)", "User likes"),
    (r"(?i)i prefer (.+)", "User prefers"),
    (r"(?i)i am learning (.+)", "User is learning"),
    (r"(?i)i work as (.+)", "User works as"),
];

impl FactExtractor {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|(pattern, prefix)| match Regex::new(pattern) {
                Ok(regex) => Some((regex, *prefix)),
                Err(e) => {
                    tracing::error!(pattern, error = %e, "Invalid fact pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn extract(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter_map(|(regex, prefix)| {
                let captured = regex.captures(text)?.get(1)?.as_str().trim();
                if captured.is_empty() {
                    None
                } else {
                    Some(format!("{prefix} {captured}"))
                }
            })
            .collect()
    }
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new()
    }
}
