pub mod context;
mod memory;
pub mod orchestrator;
mod retrieval;
mod session;
pub mod web;

pub use context::{assemble_messages, merge_sections, ContextSection, SectionKind};
pub use memory::{MemoryService, MemoryWriter};
pub use orchestrator::{TurnComponents, TurnOrchestrator, TurnStream};
pub use retrieval::SemanticRetriever;
pub use session::SessionStore;
pub use web::{TavilyClient, WebResults, WebRetriever, WebSearch, WebSource};
