//! Top Stories API: wire types, HTTP client and the mapping to `NewsStory`.

pub mod client;
pub mod mapper;
pub mod types;

pub use client::{RemoteSource, SearchReply, TimesClient};
pub use mapper::{map_stories, map_story, ApiMapper, StoryMapper};
