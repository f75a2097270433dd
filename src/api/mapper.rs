//! Conversion from wire types to `NewsStory`.
//!
//! Only the fields a story keeps are copied. URLs, facets, item type and the
//! created/updated timestamps stop here.

use crate::news::NewsStory;

use super::types::{SearchResponse, SearchResult};

/// Seam for the mapping step of the repository, so it can be observed in tests.
pub trait StoryMapper: Send + Sync {
  fn map_stories(&self, response: SearchResponse) -> Option<Vec<NewsStory>>;
}

/// The mapper used in production; delegates to [`map_stories`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiMapper;

impl StoryMapper for ApiMapper {
  fn map_stories(&self, response: SearchResponse) -> Option<Vec<NewsStory>> {
    map_stories(response)
  }
}

/// Map every result of a response, keeping their order.
///
/// Returns `None` when the response has no `results` at all. A present but
/// empty list maps to an empty `Vec`.
pub fn map_stories(response: SearchResponse) -> Option<Vec<NewsStory>> {
  let results = response.results?;
  Some(results.into_iter().map(NewsStory::from).collect())
}

/// Map a single result. Missing fields stay missing; a missing title becomes "".
pub fn map_story(result: SearchResult) -> NewsStory {
  NewsStory {
    title: result.title.unwrap_or_default(),
    section: result.section,
    subsection: result.subsection,
    article_abstract: result.article_abstract,
    byline: result.byline,
    published_date: result.published_date,
  }
}

impl From<SearchResult> for NewsStory {
  fn from(result: SearchResult) -> Self {
    map_story(result)
  }
}
