//! Cache-first access to news stories.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::client::{RemoteSource, SearchReply};
use crate::api::mapper::{ApiMapper, StoryMapper};
use crate::fetch::FetchHandle;
use crate::store::StoryStore;

use super::error::FetchError;
use super::types::NewsStory;

/// Reads stories from the local store, falling back to the remote source.
///
/// The repository never writes to the store. A store that answers with any
/// list, even an empty one, is served as is and the remote is not asked.
pub struct NewsRepository {
  remote: Arc<dyn RemoteSource>,
  store: Arc<dyn StoryStore>,
  mapper: Arc<dyn StoryMapper>,
}

impl NewsRepository {
  pub fn new(remote: Arc<dyn RemoteSource>, store: Arc<dyn StoryStore>) -> Self {
    Self {
      remote,
      store,
      mapper: Arc::new(ApiMapper),
    }
  }

  /// Replace the mapper used for remote responses.
  pub fn with_mapper(mut self, mapper: Arc<dyn StoryMapper>) -> Self {
    self.mapper = mapper;
    self
  }

  /// Fetch stories, blocking the current thread.
  ///
  /// 1. Ask the store - any answer (including an empty list) is returned
  /// 2. Otherwise call the remote source once, no retries
  /// 3. Map the response; an unusable response is `NoData`
  pub fn fetch_stories(&self) -> Result<Vec<NewsStory>, FetchError> {
    match self.store.get_all_stories() {
      Ok(Some(stories)) => {
        debug!(count = stories.len(), "serving stories from store");
        return Ok(stories);
      }
      Ok(None) => debug!("store has no stories, asking remote"),
      Err(e) => warn!(error = %e, "failed to read store, asking remote"),
    }

    let reply = self.remote.search().map_err(|e| {
      warn!(error = %e, "remote request failed");
      FetchError::Transport(e.to_string())
    })?;

    let stories = stories_from_reply(reply, self.mapper.as_ref())?;
    info!(count = stories.len(), "fetched stories from remote");
    Ok(stories)
  }

  /// Run [`fetch_stories`](Self::fetch_stories) on the blocking pool.
  ///
  /// Must be called from within a tokio runtime. Concurrent calls are
  /// independent of each other.
  pub fn fetch_stories_async(self: &Arc<Self>) -> FetchHandle<Vec<NewsStory>> {
    let repository = Arc::clone(self);
    FetchHandle::spawn_blocking(move || repository.fetch_stories())
  }
}

/// Turn a remote reply into stories, or explain why there are none.
pub(crate) fn stories_from_reply(
  reply: SearchReply,
  mapper: &dyn StoryMapper,
) -> Result<Vec<NewsStory>, FetchError> {
  if !reply.is_success() {
    return Err(FetchError::NoData(format!(
      "remote answered with status {}",
      reply.status
    )));
  }

  let body = reply
    .body
    .ok_or_else(|| FetchError::NoData("remote answered with an empty body".to_string()))?;

  mapper
    .map_stories(body)
    .ok_or_else(|| FetchError::NoData("response has no results".to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{SearchResponse, SearchResult};
  use crate::store::NoopStore;
  use color_eyre::{eyre::eyre, Result};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  enum Answer {
    Reply(SearchReply),
    Fail,
  }

  struct MockRemote {
    answer: Answer,
    calls: AtomicUsize,
  }

  impl MockRemote {
    fn new(answer: Answer) -> Arc<Self> {
      Arc::new(Self {
        answer,
        calls: AtomicUsize::new(0),
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl RemoteSource for MockRemote {
    fn search(&self) -> Result<SearchReply> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match &self.answer {
        Answer::Reply(reply) => Ok(reply.clone()),
        Answer::Fail => Err(eyre!("connection refused")),
      }
    }

    fn search_section(&self, _section: &str) -> Result<SearchReply> {
      self.search()
    }
  }

  /// Store with fixed contents that counts reads and refuses writes.
  struct MockStore {
    stories: Option<Vec<NewsStory>>,
    broken: bool,
    inserts: Mutex<Vec<NewsStory>>,
  }

  impl MockStore {
    fn with(stories: Option<Vec<NewsStory>>) -> Arc<Self> {
      Arc::new(Self {
        stories,
        broken: false,
        inserts: Mutex::new(Vec::new()),
      })
    }

    fn broken() -> Arc<Self> {
      Arc::new(Self {
        stories: None,
        broken: true,
        inserts: Mutex::new(Vec::new()),
      })
    }
  }

  impl StoryStore for MockStore {
    fn get_all_stories(&self) -> Result<Option<Vec<NewsStory>>> {
      if self.broken {
        return Err(eyre!("disk I/O error"));
      }
      Ok(self.stories.clone())
    }

    fn find_story_by_title(&self, _title: &str) -> Result<Option<NewsStory>> {
      Ok(None)
    }

    fn insert_all_stories(&self, stories: &[NewsStory]) -> Result<()> {
      self.inserts.lock().unwrap().extend_from_slice(stories);
      Ok(())
    }

    fn delete_story(&self, _title: &str) -> Result<bool> {
      Ok(false)
    }
  }

  /// Remote that blocks inside `search` until released.
  struct GatedRemote {
    gate: Mutex<std::sync::mpsc::Receiver<()>>,
    entered: AtomicUsize,
  }

  impl RemoteSource for GatedRemote {
    fn search(&self) -> Result<SearchReply> {
      self.entered.fetch_add(1, Ordering::SeqCst);
      let _ = self.gate.lock().unwrap().recv();
      Ok(SearchReply::ok(response(&["too late"])))
    }

    fn search_section(&self, _section: &str) -> Result<SearchReply> {
      self.search()
    }
  }

  struct CountingMapper {
    calls: AtomicUsize,
  }

  impl StoryMapper for CountingMapper {
    fn map_stories(&self, response: SearchResponse) -> Option<Vec<NewsStory>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      ApiMapper.map_stories(response)
    }
  }

  fn stored(title: &str) -> NewsStory {
    NewsStory {
      title: title.to_string(),
      section: Some("stored".to_string()),
      ..Default::default()
    }
  }

  fn response(titles: &[&str]) -> SearchResponse {
    SearchResponse {
      status: Some("OK".to_string()),
      num_results: titles.len() as i64,
      results: Some(
        titles
          .iter()
          .map(|t| SearchResult {
            title: Some(t.to_string()),
            section: Some("remote".to_string()),
            url: Some("https://example.com".to_string()),
            ..Default::default()
          })
          .collect(),
      ),
      ..Default::default()
    }
  }

  #[test]
  fn test_store_hit_skips_remote() {
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(response(&["remote"]))));
    let store = MockStore::with(Some(vec![stored("a"), stored("b")]));
    let repository = NewsRepository::new(remote.clone(), store);

    let stories = repository.fetch_stories().unwrap();

    assert_eq!(stories, vec![stored("a"), stored("b")]);
    assert_eq!(remote.calls(), 0);
  }

  // An empty store cannot be told apart from a store that was never filled,
  // so it is served as a hit and the remote is never asked. This keeps the
  // existing behaviour; it is probably not what anyone wants.
  #[test]
  fn test_empty_store_counts_as_hit() {
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(response(&["remote"]))));
    let repository = NewsRepository::new(remote.clone(), MockStore::with(Some(vec![])));

    assert_eq!(repository.fetch_stories(), Ok(vec![]));
    assert_eq!(remote.calls(), 0);
  }

  #[test]
  fn test_store_miss_maps_remote_stories() {
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(response(&["one", "two"]))));
    let store = MockStore::with(None);
    let repository = NewsRepository::new(remote.clone(), store.clone());

    let stories = repository.fetch_stories().unwrap();

    assert_eq!(remote.calls(), 1);
    let titles: Vec<&str> = stories.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["one", "two"]);
    assert_eq!(stories[0].section.as_deref(), Some("remote"));
  }

  #[test]
  fn test_remote_stories_are_not_written_back() {
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(response(&["one"]))));
    let store = MockStore::with(None);
    let repository = NewsRepository::new(remote.clone(), store.clone());

    repository.fetch_stories().unwrap();
    repository.fetch_stories().unwrap();

    assert!(store.inserts.lock().unwrap().is_empty());
    assert_eq!(remote.calls(), 2);
  }

  #[test]
  fn test_transport_failure_skips_mapper() {
    let remote = MockRemote::new(Answer::Fail);
    let mapper = Arc::new(CountingMapper {
      calls: AtomicUsize::new(0),
    });
    let repository =
      NewsRepository::new(remote.clone(), MockStore::with(None)).with_mapper(mapper.clone());

    let err = repository.fetch_stories().unwrap_err();

    assert!(err.is_transport());
    assert_eq!(remote.calls(), 1);
    assert_eq!(mapper.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_missing_results_is_no_data() {
    let body = SearchResponse {
      status: Some("OK".to_string()),
      num_results: 5,
      results: None,
      ..Default::default()
    };
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(body)));
    let repository = NewsRepository::new(remote, MockStore::with(None));

    assert!(repository.fetch_stories().unwrap_err().is_no_data());
  }

  #[test]
  fn test_unsuccessful_status_is_no_data() {
    let remote = MockRemote::new(Answer::Reply(SearchReply {
      status: 429,
      body: None,
    }));
    let mapper = Arc::new(CountingMapper {
      calls: AtomicUsize::new(0),
    });
    let repository =
      NewsRepository::new(remote, MockStore::with(None)).with_mapper(mapper.clone());

    let err = repository.fetch_stories().unwrap_err();
    assert_eq!(
      err,
      FetchError::NoData("remote answered with status 429".to_string())
    );
    assert_eq!(mapper.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_empty_body_is_no_data() {
    let remote = MockRemote::new(Answer::Reply(SearchReply {
      status: 200,
      body: None,
    }));
    let repository = NewsRepository::new(remote, Arc::new(NoopStore));

    assert!(repository.fetch_stories().unwrap_err().is_no_data());
  }

  #[test]
  fn test_broken_store_falls_back_to_remote() {
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(response(&["fresh"]))));
    let repository = NewsRepository::new(remote.clone(), MockStore::broken());

    let stories = repository.fetch_stories().unwrap();
    assert_eq!(stories.len(), 1);
    assert_eq!(remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_async_fetch_delivers_result() {
    let remote = MockRemote::new(Answer::Reply(SearchReply::ok(response(&["x", "y"]))));
    let repository = Arc::new(NewsRepository::new(remote, MockStore::with(None)));

    let mut handle = repository.fetch_stories_async();
    let stories = handle.wait().await.unwrap().unwrap();

    assert_eq!(stories.len(), 2);
  }

  #[tokio::test]
  async fn test_async_fetch_delivers_failure() {
    let repository = Arc::new(NewsRepository::new(
      MockRemote::new(Answer::Fail),
      MockStore::with(None),
    ));

    let mut handle = repository.fetch_stories_async();
    let result = handle.wait().await.unwrap();

    assert!(result.unwrap_err().is_transport());
  }

  #[tokio::test]
  async fn test_cancelled_async_fetch_delivers_nothing() {
    let (release, gate) = std::sync::mpsc::channel::<()>();
    let remote = Arc::new(GatedRemote {
      gate: Mutex::new(gate),
      entered: AtomicUsize::new(0),
    });
    let repository = Arc::new(NewsRepository::new(remote.clone(), MockStore::with(None)));

    let mut handle = repository.fetch_stories_async();
    while remote.entered.load(Ordering::SeqCst) == 0 {
      tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    handle.cancel();
    release.send(()).unwrap();
    handle.finished().await;

    assert_eq!(remote.entered.load(Ordering::SeqCst), 1);
    assert_eq!(handle.poll(), None);
    assert_eq!(handle.wait().await, None);
    assert_eq!(handle.status(), crate::fetch::FetchStatus::Cancelled);
  }

  #[tokio::test]
  async fn test_concurrent_fetches_stay_independent() {
    let remote = MockRemote::new(Answer::Fail);
    let first = Arc::new(NewsRepository::new(
      remote.clone(),
      MockStore::with(Some(vec![stored("first-1"), stored("first-2")])),
    ));
    let second = Arc::new(NewsRepository::new(
      remote.clone(),
      MockStore::with(Some(vec![stored("second-1")])),
    ));

    let mut first_handle = first.fetch_stories_async();
    let mut second_handle = second.fetch_stories_async();
    let (first_result, second_result) =
      futures::future::join(first_handle.wait(), second_handle.wait()).await;

    assert_eq!(
      first_result,
      Some(Ok(vec![stored("first-1"), stored("first-2")]))
    );
    assert_eq!(second_result, Some(Ok(vec![stored("second-1")])));
    assert_eq!(remote.calls(), 0);
  }
}
