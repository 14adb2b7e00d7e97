mod chunk;
mod conversation;
mod memory;
mod retrieval;

pub use chunk::*;
pub use conversation::*;
pub use memory::*;
pub use retrieval::*;

/// Free-form JSON metadata stored next to each vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
