use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use newsfeed::api::TimesClient;
use newsfeed::config::{ApiConfig, Config};
use newsfeed::news::{self, NewsRepository, NewsStory};
use newsfeed::store::{NoopStore, SqliteStore, StoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "newsfeed")]
#[command(about = "Read New York Times top stories, preferring the local copy")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/newsfeed/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Section to read instead of the home page (e.g. world, arts)
  #[arg(short, long)]
  section: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show top stories (default)
  Stories,
  /// Fetch stories from the API and store the ones not stored yet
  Ingest,
  /// Show the first stored story whose title matches a LIKE pattern
  Show { title: String },
  /// Delete a stored story by its exact title
  Delete { title: String },
}

fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override section if specified on command line
  let config = if let Some(section) = args.section {
    Config {
      api: ApiConfig {
        section: Some(section),
        ..config.api
      },
      ..config
    }
  } else {
    config
  };

  let _log_guard = newsfeed::logging::init(&config.log)?;
  let store = open_store(&config)?;

  match args.command.unwrap_or(Command::Stories) {
    Command::Stories => {
      // The blocking HTTP client has to be created outside the runtime
      let remote = Arc::new(TimesClient::new(&config)?);
      let repository = Arc::new(NewsRepository::new(remote, store));

      let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
      runtime.block_on(show_stories(&repository))
    }
    Command::Ingest => {
      let remote = TimesClient::new(&config)?;
      let count = news::ingest(&remote, store.as_ref(), config.api.section.as_deref())?;
      println!("Stored {} new stories", count);
      Ok(())
    }
    Command::Show { title } => {
      match store.find_story_by_title(&title)? {
        Some(story) => print_story(&story),
        None => println!("No stored story matches {:?}", title),
      }
      Ok(())
    }
    Command::Delete { title } => {
      if store.delete_story(&title)? {
        println!("Deleted {:?}", title);
        Ok(())
      } else {
        Err(eyre!("No stored story titled {:?}", title))
      }
    }
  }
}

fn open_store(config: &Config) -> Result<Arc<dyn StoryStore>> {
  if !config.cache.enabled {
    info!("local store disabled");
    return Ok(Arc::new(NoopStore));
  }

  let store = match &config.cache.path {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  };
  Ok(Arc::new(store))
}

/// Foreground loop: start the fetch, then collect its result on each tick.
async fn show_stories(repository: &Arc<NewsRepository>) -> Result<()> {
  let mut handle = repository.fetch_stories_async();
  let mut ticker = tokio::time::interval(Duration::from_millis(50));

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        let Some(result) = handle.poll() else {
          continue;
        };
        return match result {
          Ok(stories) if stories.is_empty() => {
            println!("No stories.");
            Ok(())
          }
          Ok(stories) => {
            for story in &stories {
              print_story(story);
            }
            Ok(())
          }
          Err(e) => Err(eyre!("No stories available: {}", e)),
        };
      }
      _ = tokio::signal::ctrl_c() => {
        handle.cancel();
        eprintln!("Cancelled, waiting for the request to finish...");
        handle.finished().await;
        return Ok(());
      }
    }
  }
}

fn print_story(story: &NewsStory) {
  println!("{}", story.title);

  let section = match (&story.section, &story.subsection) {
    (Some(section), Some(sub)) if !sub.is_empty() => format!("{} / {}", section, sub),
    (Some(section), _) => section.clone(),
    (None, _) => String::new(),
  };
  let meta: Vec<&str> = [
    Some(section.as_str()),
    story.byline.as_deref(),
    story.published_date.as_deref(),
  ]
  .into_iter()
  .flatten()
  .filter(|s| !s.is_empty())
  .collect();
  if !meta.is_empty() {
    println!("  {}", meta.join(" | "));
  }

  if let Some(text) = story.article_abstract.as_deref().filter(|s| !s.is_empty()) {
    println!("  {}", text);
  }
  println!();
}
