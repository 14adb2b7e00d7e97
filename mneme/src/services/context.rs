//! Prioritized context assembly for one chat turn.

use crate::llm::prompts::chat_system_prompt;
use crate::models::{ChatMessage, Role};

/// Where a block of context came from. Lower ranks render first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    LongTermMemory,
    FreshMemory,
    UploadedFile(String),
    FileReadError,
    DocumentContext,
    WebSearch,
}

impl SectionKind {
    pub fn rank(&self) -> u8 {
        match self {
            SectionKind::LongTermMemory => 0,
            SectionKind::FreshMemory => 1,
            SectionKind::UploadedFile(_) | SectionKind::FileReadError => 2,
            SectionKind::DocumentContext => 3,
            SectionKind::WebSearch => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSection {
    pub kind: SectionKind,
    pub body: String,
}

impl ContextSection {
    pub fn new(kind: SectionKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    pub fn file_read_error() -> Self {
        Self::new(SectionKind::FileReadError, "")
    }

    fn is_empty(&self) -> bool {
        !matches!(self.kind, SectionKind::FileReadError) && self.body.trim().is_empty()
    }

    fn render(&self) -> String {
        let body = self.body.trim_end();
        match &self.kind {
            SectionKind::LongTermMemory => format!("--- Long-term Memory ---\n{body}"),
            SectionKind::FreshMemory => format!("--- JUST LEARNED (Priority) ---\n{body}"),
            SectionKind::UploadedFile(name) => {
                format!("--- Uploaded File ({name}) ---\n{body}\n--- End File ---")
            }
            SectionKind::FileReadError => "(File read error)".to_string(),
            SectionKind::DocumentContext => format!("--- RAG Context ---\n{body}"),
            SectionKind::WebSearch => format!("--- Web Search ---\n{body}"),
        }
    }
}

/// Renders non-empty sections in rank order, separated by blank lines.
/// Sections of equal rank keep their input order.
pub fn merge_sections(mut sections: Vec<ContextSection>) -> String {
    sections.retain(|section| !section.is_empty());
    sections.sort_by_key(|section| section.kind.rank());
    sections
        .iter()
        .map(ContextSection::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Inserts the context system message just before the final user message.
/// With no context the messages are returned unchanged.
pub fn assemble_messages(messages: &[ChatMessage], context: &str) -> Vec<ChatMessage> {
    if context.trim().is_empty() {
        return messages.to_vec();
    }

    let insert_at = messages
        .iter()
        .rposition(|message| message.role == Role::User)
        .unwrap_or(messages.len());

    let mut assembled = Vec::with_capacity(messages.len() + 1);
    assembled.extend_from_slice(&messages[..insert_at]);
    assembled.push(ChatMessage::system(chat_system_prompt(context)));
    assembled.extend_from_slice(&messages[insert_at..]);
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sections_render_in_rank_order() {
        let merged = merge_sections(vec![
            ContextSection::new(SectionKind::WebSearch, "Quick answer: 42"),
            ContextSection::new(SectionKind::FreshMemory, "User likes tea"),
            ContextSection::new(SectionKind::DocumentContext, "[Unknown Date] chunk"),
            ContextSection::new(SectionKind::LongTermMemory, "[Unknown Date] User's name is Priya"),
        ]);

        assert_eq!(
            merged,
            "--- Long-term Memory ---\n[Unknown Date] User's name is Priya\n\n\
             --- JUST LEARNED (Priority) ---\nUser likes tea\n\n\
             --- RAG Context ---\n[Unknown Date] chunk\n\n\
             --- Web Search ---\nQuick answer: 42"
        );
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let merged = merge_sections(vec![
            ContextSection::new(SectionKind::LongTermMemory, ""),
            ContextSection::new(SectionKind::WebSearch, "  \n"),
        ]);
        assert_eq!(merged, "");
    }

    #[test]
    fn test_uploaded_file_is_delimited() {
        let merged = merge_sections(vec![ContextSection::new(
            SectionKind::UploadedFile("notes.txt".into()),
            "Q3 revenue grew 12%.\n",
        )]);
        assert_eq!(
            merged,
            "--- Uploaded File (notes.txt) ---\nQ3 revenue grew 12%.\n--- End File ---"
        );

        assert_eq!(
            merge_sections(vec![ContextSection::file_read_error()]),
            "(File read error)"
        );
    }

    #[test]
    fn test_system_message_goes_before_last_user_turn() {
        let messages = vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("What's my name?"),
        ];

        let assembled = assemble_messages(&messages, "--- Long-term Memory ---\nx");
        assert_eq!(assembled.len(), 4);
        assert_eq!(assembled[2].role, Role::System);
        assert!(assembled[2].content.ends_with("Context:\n--- Long-term Memory ---\nx"));
        assert_eq!(assembled[3], messages[2]);

        assert_eq!(assemble_messages(&messages, ""), messages);
    }
}
