use crate::api::types::SearchResponse;
use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

/// What the remote source answered with, before any interpretation.
#[derive(Debug, Clone)]
pub struct SearchReply {
  /// HTTP status code
  pub status: u16,
  /// Decoded body, `None` when the server sent no body
  pub body: Option<SearchResponse>,
}

impl SearchReply {
  pub fn ok(body: SearchResponse) -> Self {
    Self {
      status: 200,
      body: Some(body),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A blocking source of top stories.
///
/// `Err` means the request itself failed (connection, protocol, undecodable
/// body). Any answer the server did give, including error statuses, is an `Ok`.
pub trait RemoteSource: Send + Sync {
  /// Fetch the default list of top stories.
  fn search(&self) -> Result<SearchReply>;

  /// Fetch the top stories of a single section (e.g. "arts", "world").
  fn search_section(&self, section: &str) -> Result<SearchReply>;
}

/// Top Stories API client.
#[derive(Clone)]
pub struct TimesClient {
  http: Client,
  base_url: Url,
  api_key: String,
  /// Section used by `search()`; `None` means the home page
  section: Option<String>,
}

impl TimesClient {
  /// Build a client from configuration.
  ///
  /// Must be called outside of an async context; the underlying blocking
  /// HTTP client owns its own runtime.
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    let client = Self::with_base_url(&config.api.base_url, api_key)?;
    Ok(client.with_section(config.api.section.clone()))
  }

  pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
    // Url::join drops the last path segment unless the base ends with '/'
    let base_url = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };
    let base_url =
      Url::parse(&base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;

    let http = Client::builder()
      .user_agent(concat!("newsfeed/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      api_key: api_key.into(),
      section: None,
    })
  }

  pub fn with_section(mut self, section: Option<String>) -> Self {
    self.section = section;
    self
  }

  /// Resolve an endpoint and attach the API key.
  fn endpoint(&self, path: &str) -> Result<Url> {
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;
    url.query_pairs_mut().append_pair("api-key", &self.api_key);
    Ok(url)
  }

  fn get(&self, path: &str) -> Result<SearchReply> {
    let url = self.endpoint(path)?;
    debug!(endpoint = path, "requesting top stories");

    let response = self
      .http
      .get(url)
      .send()
      .map_err(|e| eyre!("Failed to request {}: {}", path, e))?;

    let status = response.status();
    if !status.is_success() {
      debug!(endpoint = path, status = status.as_u16(), "unsuccessful response");
      return Ok(SearchReply {
        status: status.as_u16(),
        body: None,
      });
    }

    let bytes = response
      .bytes()
      .map_err(|e| eyre!("Failed to read response from {}: {}", path, e))?;

    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
      None
    } else {
      let body: SearchResponse = serde_json::from_slice(&bytes)
        .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))?;
      Some(body)
    };

    Ok(SearchReply {
      status: status.as_u16(),
      body,
    })
  }
}

impl RemoteSource for TimesClient {
  fn search(&self) -> Result<SearchReply> {
    match &self.section {
      Some(section) => self.search_section(section),
      None => self.get("home.json"),
    }
  }

  fn search_section(&self, section: &str) -> Result<SearchReply> {
    if section.is_empty() || section.contains(['/', '?', '#']) {
      return Err(eyre!("Invalid section name: {:?}", section));
    }
    self.get(&format!("{}.json", section))
  }
}
