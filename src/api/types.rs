//! Serde-deserializable types matching the Top Stories API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping `NewsStory` focused on what the application persists and shows.
//! Nothing outside the `api` module should need to look at them.

use serde::Deserialize;

// ============================================================================
// Search response - returned by both home.json and {section}.json
// ============================================================================

/// Top level response body.
///
/// `num_results` is reported by the server and is not checked against
/// `results`; the length of `results` is authoritative. A missing, null or
/// non-integer count reads as 0.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
  pub status: Option<String>,
  pub copyright: Option<String>,
  pub section: Option<String>,
  pub last_updated: Option<String>,
  #[serde(default, deserialize_with = "lenient_count")]
  pub num_results: i64,
  pub results: Option<Vec<SearchResult>>,
}

/// A single article in a search response.
///
/// Every field may be missing from the payload. Timestamps are kept as the
/// strings the server sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
  pub section: Option<String>,
  pub subsection: Option<String>,
  pub title: Option<String>,
  #[serde(rename = "abstract")]
  pub article_abstract: Option<String>,
  pub url: Option<String>,
  pub short_url: Option<String>,
  pub byline: Option<String>,
  pub item_type: Option<String>,
  pub updated_date: Option<String>,
  pub created_date: Option<String>,
  pub published_date: Option<String>,
  pub material_type_facet: Option<String>,
  pub kicker: Option<String>,
  #[serde(default, deserialize_with = "facet_list")]
  pub des_facet: Option<Vec<String>>,
  #[serde(default, deserialize_with = "facet_list")]
  pub org_facet: Option<Vec<String>>,
  #[serde(default, deserialize_with = "facet_list")]
  pub geo_facet: Option<Vec<String>>,
}

/// Informational counts must never reject an otherwise usable response.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(value.and_then(|v| v.as_i64()).unwrap_or_default())
}

/// The API sends `""` instead of `[]` for a facet with no tags.
/// That is still a present-but-empty facet, not a missing one. Null tags
/// inside a list are dropped.
fn facet_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Facet {
    List(Vec<Option<String>>),
    Text(String),
  }

  Ok(match Option::<Facet>::deserialize(deserializer)? {
    Some(Facet::List(tags)) => Some(tags.into_iter().flatten().collect()),
    Some(Facet::Text(text)) if text.is_empty() => Some(Vec::new()),
    Some(Facet::Text(text)) => Some(vec![text]),
    None => None,
  })
}
