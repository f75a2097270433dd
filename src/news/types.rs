/// A news story as stored locally and handed to callers.
///
/// The title identifies the story (it is the store's primary key). Stories are
/// built by the mapper from a `SearchResult` and are not changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsStory {
  pub title: String,
  pub section: Option<String>,
  pub subsection: Option<String>,
  pub article_abstract: Option<String>,
  pub byline: Option<String>,
  pub published_date: Option<String>,
}
