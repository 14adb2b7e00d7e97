mod chunker;
mod extractor;
mod ingest;

pub use chunker::WordChunker;
pub use extractor::{ContentExtractor, ContentKind};
pub use ingest::{DocumentIngestor, IngestReport};
