//! Wire types for the v1 API, kept apart from the domain models.

pub mod chat;
pub mod documents;
pub mod memories;

pub use chat::*;
pub use documents::*;
pub use memories::*;
