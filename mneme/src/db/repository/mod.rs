mod memories;
mod metadata;
mod vectors;

pub use memories::MemoryRepository;
pub use metadata::MetadataRepository;
pub use vectors::VectorRepository;
