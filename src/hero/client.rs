use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use url::Url;

use crate::cache::{RemotePage, RemoteSource};
use crate::config::Config;
use crate::error::FetchError;
use crate::hero::api_types::ApiHeroesResponse;
use crate::hero::types::Hero;

/// Heroes API client
#[derive(Clone)]
pub struct HeroClient {
  client: reqwest::Client,
  base_url: Url,
}

impl HeroClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = base_url(&config.api.url)?;
    let timeout = Duration::from_secs(config.api.timeout_secs);

    let client = reqwest::Client::builder()
      .connect_timeout(timeout)
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  /// Absolute URL of a hero's image, kept under the base path
  pub fn image_url(&self, hero: &Hero) -> Result<Url> {
    self
      .base_url
      .join(hero.image.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid image path {}: {}", hero.image, e))
  }

  fn endpoint(&self, query: Option<&str>, page: u32) -> Result<Url, FetchError> {
    let path = match query {
      Some(_) => "boruto/heroes/search",
      None => "boruto/heroes",
    };
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| FetchError::Response(format!("invalid endpoint: {}", e)))?;

    {
      let mut pairs = url.query_pairs_mut();
      if let Some(name) = query {
        pairs.append_pair("name", name);
      }
      pairs.append_pair("page", &page.to_string());
    }

    Ok(url)
  }

  /// Fetch one page of heroes, optionally filtered by name
  pub async fn get_heroes(&self, query: Option<&str>, page: u32) -> Result<RemotePage, FetchError> {
    let url = self.endpoint(query, page)?;
    tracing::debug!(%url, "fetching heroes page");

    let response: ApiHeroesResponse = self
      .client
      .get(url)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    if !response.success {
      return Err(FetchError::Response(
        response
          .message
          .unwrap_or_else(|| "server reported failure".to_string()),
      ));
    }

    tracing::debug!(
      prev_page = ?response.prev_page,
      next_page = ?response.next_page,
      last_updated = ?response.last_updated,
      count = response.heroes.len(),
      "heroes page received"
    );

    let is_last = response.is_last();
    Ok(RemotePage {
      heroes: response.heroes.into_iter().map(Hero::from).collect(),
      is_last,
    })
  }
}

/// Parse the configured base URL as a directory, so relative endpoint
/// paths land below it instead of replacing its last segment.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API url {}: {}", raw, e))?;
  if url.cannot_be_a_base() {
    return Err(eyre!("Invalid API url {}: not a base url", raw));
  }
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

impl RemoteSource for HeroClient {
  fn fetch_page<'a>(
    &'a self,
    query: Option<&'a str>,
    page: u32,
  ) -> BoxFuture<'a, Result<RemotePage, FetchError>> {
    self.get_heroes(query, page).boxed()
  }
}
