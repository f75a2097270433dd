//! Filling the store from the remote source.
//!
//! This is the only path that writes stories. `NewsRepository` reads only.

use color_eyre::Result;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::api::client::RemoteSource;
use crate::api::mapper::ApiMapper;
use crate::store::StoryStore;

use super::repository::stories_from_reply;

/// Fetch stories from the remote and insert the ones not yet stored.
///
/// Titles are the store's key: stories whose title is already stored, and
/// repeats within the same response, are skipped. Returns how many stories
/// were inserted.
pub fn ingest(
  remote: &dyn RemoteSource,
  store: &dyn StoryStore,
  section: Option<&str>,
) -> Result<usize> {
  let reply = match section {
    Some(section) => remote.search_section(section)?,
    None => remote.search()?,
  };
  let stories = stories_from_reply(reply, &ApiMapper)?;
  let fetched = stories.len();

  let mut seen: HashSet<String> = store
    .get_all_stories()?
    .unwrap_or_default()
    .into_iter()
    .map(|s| s.title)
    .collect();

  let fresh: Vec<_> = stories
    .into_iter()
    .filter(|s| seen.insert(s.title.clone()))
    .collect();

  debug!(fetched, new = fresh.len(), "ingesting stories");
  store.insert_all_stories(&fresh)?;
  info!(count = fresh.len(), "stored new stories");

  Ok(fresh.len())
}
