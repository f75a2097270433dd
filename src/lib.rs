//! Cache-first reader for the New York Times Top Stories API.
//!
//! [`NewsRepository`](news::NewsRepository) answers from the local
//! [`StoryStore`](store::StoryStore) when it can and asks the
//! [`RemoteSource`](api::RemoteSource) otherwise. Its blocking read runs in the
//! background through [`FetchHandle`](fetch::FetchHandle).

pub mod api;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod news;
pub mod store;
