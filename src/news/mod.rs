mod error;
mod ingest;
mod repository;
mod types;

pub use error::FetchError;
pub use ingest::ingest;
pub use repository::NewsRepository;
pub use types::NewsStory;
