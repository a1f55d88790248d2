mod cache;
mod config;
mod db;
mod error;
mod feed;
mod hero;
mod logging;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;

use cache::{InitializeAction, LoadKind, LoadOutcome, LocalStore, PagedCacheMediator};
use error::StoreError;
use feed::{Feed, FeedState};
use hero::cache::ListKey;
use hero::client::HeroClient;
use hero::types::Hero;

#[derive(Parser, Debug)]
#[command(name = "heroes")]
#[command(about = "Browse the hero catalog, online or from the local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/heroes/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch the first page unless the cached list is still current
  Sync {
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Discard the cache and fetch the first page again
  Refresh {
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Print cached heroes
  List {
    /// Start after this hero
    #[arg(long)]
    after: Option<i64>,
    #[arg(short, long)]
    limit: Option<usize>,
  },
  /// Fetch the page following (or preceding) a cached hero
  More {
    #[arg(long, conflicts_with = "before", required_unless_present = "before")]
    after: Option<i64>,
    #[arg(long)]
    before: Option<i64>,
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Page through the list, fetching as the cache runs out
  Browse {
    #[arg(short, long)]
    query: Option<String>,
    /// Number of pages to show
    #[arg(long, default_value_t = 3)]
    pages: usize,
  },
  /// Search heroes by name
  Search { term: String },
  /// Show one cached hero
  Show { id: i64 },
  /// Show or change the onboarding flag
  Onboarding {
    #[arg(long, conflicts_with = "reset")]
    complete: bool,
    #[arg(long)]
    reset: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log, &db::data_dir()?)?;

  // Build the collaborators once and hand them down
  let store = Arc::new(LocalStore::open(config.cache.path.as_deref())?);
  let client = HeroClient::new(&config)?;
  let mediator = Arc::new(PagedCacheMediator::new(
    client.clone(),
    Arc::clone(&store),
    config.cache_timeout(),
  ));

  match args.command {
    Command::Sync { query } => {
      let list = ListKey::for_query(query.as_deref());
      match mediator.initialize(&list)? {
        InitializeAction::SkipInitialRefresh => println!("{} is up to date", list.description()),
        InitializeAction::LaunchInitialRefresh => {
          report(&mediator.load(&list, LoadKind::Initial).await?)?;
        }
      }
    }

    Command::Refresh { query } => {
      let list = ListKey::for_query(query.as_deref());
      report(&mediator.load(&list, LoadKind::Refresh).await?)?;
    }

    Command::List { after, limit } => {
      let heroes = store.page_after(after, limit.unwrap_or(config.cache.page_size))?;
      if heroes.is_empty() {
        println!("no cached heroes");
      }
      print_heroes(&heroes);
    }

    Command::More {
      after,
      before,
      query,
    } => {
      let list = ListKey::for_query(query.as_deref());
      let kind = match before {
        Some(first) => LoadKind::Prepend {
          first_hero_id: Some(first),
        },
        None => LoadKind::Append {
          last_hero_id: after,
        },
      };
      let outcome = mediator.load(&list, kind).await?;
      report(&outcome)?;
      if let LoadOutcome::Loaded { count, .. } = outcome {
        print_heroes(&store.page_after(after, count)?);
      }
    }

    Command::Browse { query, pages } => {
      let mut feed = Feed::new(
        Arc::clone(&mediator),
        ListKey::for_query(query.as_deref()),
        config.cache.page_size,
      );
      println!("{}", feed.list().description());

      feed.start().await?;
      print_heroes(feed.heroes());
      for _ in 1..pages {
        if !feed.state().can_load_more() {
          break;
        }
        let shown = feed.heroes().len();
        feed.load_more().await?;
        print_heroes(&feed.heroes()[shown..]);
      }

      match feed.state() {
        FeedState::EndOfData => println!("-- end of list --"),
        FeedState::Error(e) => eprintln!("load failed: {}", e),
        FeedState::Idle => println!("list is not cached; run `heroes sync`"),
        FeedState::Ready | FeedState::Loading => {}
      }
    }

    Command::Search { term } => {
      let list = ListKey::for_query(Some(&term));
      if mediator.initialize(&list)? == InitializeAction::LaunchInitialRefresh {
        let outcome = mediator.load(&list, LoadKind::Initial).await?;
        if let Some(e) = outcome.error() {
          // Fall back to whatever the cache can answer
          eprintln!("search request failed ({}); showing cached matches", e);
        }
      }
      let heroes = store.search(&term)?;
      if heroes.is_empty() {
        println!("no heroes match {:?}", term);
      }
      print_heroes(&heroes);
    }

    Command::Show { id } => {
      let hero = match store.find_by_id(id) {
        Ok(hero) => hero,
        Err(StoreError::NotFound(id)) => {
          return Err(eyre!("hero {} is not cached; run `heroes sync` first", id))
        }
        Err(e) => return Err(e.into()),
      };
      print_hero_details(&hero, &client)?;
    }

    Command::Onboarding { complete, reset } => {
      if complete || reset {
        store.set_onboarding_completed(complete)?;
      }
      println!(
        "onboarding completed: {}",
        store.onboarding_completed()?
      );
    }
  }

  Ok(())
}

fn report(outcome: &LoadOutcome) -> Result<()> {
  match outcome {
    LoadOutcome::Loaded {
      page,
      count,
      end_of_data,
    } => {
      let suffix = if *end_of_data { " (last page)" } else { "" };
      println!("cached page {}: {} heroes{}", page, count, suffix);
    }
    LoadOutcome::EndOfData => println!("no more heroes"),
    LoadOutcome::Skipped => println!("nothing to continue from; run `heroes sync` first"),
    LoadOutcome::Failed(e) => return Err(eyre!("load failed: {}", e)),
  }
  Ok(())
}

fn print_heroes(heroes: &[Hero]) {
  for hero in heroes {
    println!("{:>5}  {:>4.1}  {}", hero.id, hero.rating, hero.name);
  }
}

fn print_hero_details(hero: &Hero, client: &HeroClient) -> Result<()> {
  println!("{} (#{})", hero.name, hero.id);
  println!("  rating:    {:.1}", hero.rating);
  println!("  power:     {}", hero.power);
  println!("  birthday:  {} {}", hero.month, hero.day);
  println!("  image:     {}", client.image_url(hero)?);
  println!("  family:    {}", hero.family.join(", "));
  println!("  abilities: {}", hero.abilities.join(", "));
  println!("  nature:    {}", hero.nature_types.join(", "));
  println!();
  println!("{}", hero.about);
  Ok(())
}
