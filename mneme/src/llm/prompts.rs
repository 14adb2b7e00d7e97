//! Prompt templates for the importance scorer and the chat system message.

/// System prompt for the primary importance scorer.
pub const SCORER_SYSTEM_PROMPT: &str = r#"Analyze the user's message to extract ONLY highly important, long-term facts.
- STORE: name, profession, core preferences (e.g. "I only code in Python"), long-term goals.
- IGNORE: temporary states (e.g. "I am hungry"), small talk ("Hi", "Thanks"), simple questions ("What is RAG?"), opinions about the chat ("You are smart"), and maths problems.

Return JSON only:
{
  "importance": number (0-1),
  "memory": string | null
}
Use about 0.9 for a name or job and about 0.1 for pleasantries. When "memory" is set, phrase it as a statement about the user, e.g. "User works as a nurse"."#;

/// Shorter prompt sent to the fallback scorer model.
pub const SCORER_FALLBACK_SYSTEM_PROMPT: &str = "You are a memory extractor. Analyze the user message. Return JSON: { importance: number, memory: string | null }.";

pub fn scorer_user_prompt(message: &str) -> String {
    format!(
        "Message:\n\"{message}\"\n\nReturn JSON like:\n{{\n  \"importance\": number (0-1),\n  \"memory\": string | null\n}}"
    )
}

/// Preamble of the system message injected before the final user turn when
/// any context section is present. The rendered sections follow `Context:`.
pub const CHAT_SYSTEM_PREAMBLE: &str = r#"You are a helpful, intelligent, and comprehensive AI assistant.
Answer the user's question in detail, using Markdown for clarity (headers, bullet points, bold text).
Integrate the provided context naturally into your response.
You have access to long-term memory. When answering, explicitly mention what you recall if it's relevant (e.g., "I remember you mentioned...").
If the context is not relevant, ignore it and answer fully from your general knowledge.
If there are conflicting facts, prioritize the most recent one. **TRUST [JUST LEARNED] FACTS ABOVE ALL ELSE.**"#;

pub fn chat_system_prompt(context: &str) -> String {
    format!("{CHAT_SYSTEM_PREAMBLE}\n\nContext:\n{context}")
}
