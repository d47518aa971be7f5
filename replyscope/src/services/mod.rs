//! Pipeline stages and their sequencing

pub mod pipeline_orchestrator;
pub mod reply_fetcher;
pub mod tabular_store;
pub mod text_normalizer;

pub use pipeline_orchestrator::PipelineOrchestrator;
pub use reply_fetcher::{progress_indicator, FetchError, ReplyFetcher};
pub use tabular_store::{read_messages, read_records, write_records, PersistenceError};
pub use text_normalizer::{clean_message, normalize, normalize_messages};
