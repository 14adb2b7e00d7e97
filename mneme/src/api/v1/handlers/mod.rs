pub mod chat;
pub mod documents;
pub(crate) mod health;
pub mod memories;

pub use health::health_check;
