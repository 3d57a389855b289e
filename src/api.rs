use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use image::DynamicImage;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;

/// Shown when the service can't be reached or sends back something we
/// can't make sense of. Server-supplied `detail` messages take precedence.
pub const FALLBACK_MESSAGE: &str = "Could not fetch recommendations. Try again.";

/// A movie as returned by the recommendation service.
///
/// The numeric `genre_ids` set is the canonical filtering key; human-readable
/// names come from the separate `/genres` mapping. Legacy response fields
/// (`genre` name arrays, `popularity`) are ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct Movie {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub overview: Option<String>,
  #[serde(default)]
  pub poster_path: Option<String>,
  #[serde(default)]
  pub release_date: Option<String>,
  #[serde(default)]
  pub vote_average: Option<f64>,
  #[serde(default)]
  pub genre_ids: Vec<u32>,
  #[serde(default)]
  pub director: Option<String>,
}

impl Movie {
  /// Release year parsed from the `YYYY-MM-DD` date string, if present and well-formed.
  pub fn release_year(&self) -> Option<i32> {
    let date = self.release_date.as_deref()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok().map(|d| d.year())
  }
}

/// One successful lookup: the movie that matched the query plus the ranked
/// list of similar movies. Replaced wholesale on each new search.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationResult {
  pub searched_movie: Movie,
  pub recommendations: Vec<Movie>,
}

/// Error payload the service attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  detail: Option<String>,
}

pub fn new_client() -> Client {
  Client::builder()
    .timeout(Duration::from_secs(constants().request_timeout_secs))
    .build()
    .unwrap_or_else(|_| Client::new())
}

/// Build the lookup URL, percent-encoding the title as a path segment.
fn recommendations_url(base: &str, title: &str) -> Result<Url> {
  let mut url = Url::parse(base).with_context(|| format!("Invalid API base URL: {}", base))?;
  url
    .path_segments_mut()
    .map_err(|_| anyhow!("API base URL cannot be used as a base: {}", base))?
    .pop_if_empty()
    .push("recommendations")
    .push(title);
  Ok(url)
}

fn genres_url(base: &str) -> Result<Url> {
  let mut url = Url::parse(base).with_context(|| format!("Invalid API base URL: {}", base))?;
  url
    .path_segments_mut()
    .map_err(|_| anyhow!("API base URL cannot be used as a base: {}", base))?
    .pop_if_empty()
    .push("genres");
  Ok(url)
}

/// Pick the user-visible message for a failed lookup: the server's `detail`
/// when the body carries one, otherwise the generic fallback.
fn lookup_error_message(status: StatusCode, body: &str) -> String {
  serde_json::from_str::<ErrorBody>(body)
    .ok()
    .and_then(|b| b.detail)
    .filter(|d| !d.trim().is_empty())
    .unwrap_or_else(|| format!("{} (HTTP {})", FALLBACK_MESSAGE, status.as_u16()))
}

/// Look up recommendations for a movie title.
///
/// Every failure mode — unreachable service, non-2xx status, undecodable
/// body — comes back as an error whose display string is ready to show the
/// user. Callers never need to inspect the cause chain.
pub async fn fetch_recommendations(client: &Client, base: &str, title: &str) -> Result<RecommendationResult> {
  let url = recommendations_url(base, title)?;
  debug!(url = %url, "recommendation lookup");

  let response = client.get(url).send().await.map_err(|e| {
    warn!(err = %e, "recommendation request failed");
    anyhow!(FALLBACK_MESSAGE)
  })?;

  let status = response.status();
  let body = response.text().await.unwrap_or_default();
  if !status.is_success() {
    return Err(anyhow!(lookup_error_message(status, &body)));
  }

  serde_json::from_str(&body).map_err(|e| {
    warn!(err = %e, "recommendation response did not decode");
    anyhow!(FALLBACK_MESSAGE)
  })
}

/// Fetch the genre-id → name mapping. The wire format keys ids as strings;
/// unparseable keys are dropped. Failure here is non-fatal for the caller.
pub async fn fetch_genres(client: &Client, base: &str) -> Result<HashMap<u32, String>> {
  let url = genres_url(base)?;
  debug!(url = %url, "genre mapping lookup");

  let raw: HashMap<String, String> = client
    .get(url)
    .send()
    .await
    .context("Genre request failed")?
    .error_for_status()
    .context("Genre lookup returned an error status")?
    .json()
    .await
    .context("Genre response did not decode")?;

  Ok(raw.into_iter().filter_map(|(id, name)| id.parse().ok().map(|id| (id, name))).collect())
}

/// Resolve a poster URL from the fixed image-host template.
/// `poster_path` is the service-provided fragment (normally starts with '/').
pub fn poster_url(size: &str, poster_path: &str) -> String {
  let base = constants().image_base_url.trim_end_matches('/');
  if poster_path.starts_with('/') {
    format!("{}/{}{}", base, size, poster_path)
  } else {
    format!("{}/{}/{}", base, size, poster_path)
  }
}

/// Fetch and decode a poster image, trying the configured sizes largest-first.
pub async fn fetch_poster(client: &Client, poster_path: &str) -> Result<DynamicImage> {
  for size in &constants().poster_sizes {
    let url = poster_url(size, poster_path);
    if let Ok(response) = client.get(&url).send().await
      && response.status().is_success()
    {
      let bytes = response.bytes().await.with_context(|| format!("Failed to read poster bytes from {}", url))?;
      let image =
        image::load_from_memory(&bytes).with_context(|| format!("Failed to decode poster image (URL: {})", url))?;
      return Ok(image);
    }
  }
  Err(anyhow!("No poster available for path: {}", poster_path))
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- wire shapes ---

  #[test]
  fn movie_full_shape_deserializes() {
    let json = r#"{
      "id": 27205,
      "title": "Inception",
      "overview": "A thief who steals corporate secrets...",
      "poster_path": "/inception.jpg",
      "release_date": "2010-07-15",
      "vote_average": 8.4,
      "genre_ids": [28, 878, 12],
      "director": "Christopher Nolan"
    }"#;
    let movie: Movie = serde_json::from_str(json).unwrap();
    assert_eq!(movie.id, 27205);
    assert_eq!(movie.genre_ids, vec![28, 878, 12]);
    assert_eq!(movie.director.as_deref(), Some("Christopher Nolan"));
    assert_eq!(movie.release_year(), Some(2010));
  }

  #[test]
  fn movie_minimal_shape_uses_defaults() {
    let movie: Movie = serde_json::from_str(r#"{"id": 1, "title": "Untitled"}"#).unwrap();
    assert!(movie.genre_ids.is_empty());
    assert!(movie.poster_path.is_none());
    assert!(movie.vote_average.is_none());
    assert_eq!(movie.release_year(), None);
  }

  #[test]
  fn movie_legacy_fields_are_ignored() {
    // Older service responses carried resolved genre names and popularity.
    let json = r#"{
      "id": 2,
      "title": "Old Shape",
      "genre": ["Action", "Drama"],
      "popularity": 91.3,
      "genre_ids": [18]
    }"#;
    let movie: Movie = serde_json::from_str(json).unwrap();
    assert_eq!(movie.genre_ids, vec![18]);
  }

  #[test]
  fn recommendation_result_deserializes() {
    let json = r#"{
      "searched_movie": {"id": 1, "title": "Inception", "genre_ids": [28]},
      "recommendations": [
        {"id": 2, "title": "Interstellar", "genre_ids": [878, 18]},
        {"id": 3, "title": "Memento", "genre_ids": [53]}
      ]
    }"#;
    let result: RecommendationResult = serde_json::from_str(json).unwrap();
    assert_eq!(result.searched_movie.title, "Inception");
    assert_eq!(result.recommendations.len(), 2);
    assert_eq!(result.recommendations[0].title, "Interstellar");
  }

  #[test]
  fn malformed_release_date_yields_no_year() {
    let movie: Movie = serde_json::from_str(r#"{"id": 4, "title": "X", "release_date": "soon"}"#).unwrap();
    assert_eq!(movie.release_year(), None);
  }

  // --- error message selection ---

  #[test]
  fn error_message_prefers_server_detail() {
    let msg = lookup_error_message(StatusCode::NOT_FOUND, r#"{"detail": "Movie not found"}"#);
    assert_eq!(msg, "Movie not found");
  }

  #[test]
  fn error_message_falls_back_without_detail() {
    let msg = lookup_error_message(StatusCode::BAD_GATEWAY, "");
    assert!(msg.contains(FALLBACK_MESSAGE));
    assert!(msg.contains("502"));
  }

  #[test]
  fn error_message_falls_back_on_blank_detail() {
    let msg = lookup_error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail": "  "}"#);
    assert!(msg.contains(FALLBACK_MESSAGE));
  }

  #[test]
  fn error_message_falls_back_on_non_json_body() {
    let msg = lookup_error_message(StatusCode::SERVICE_UNAVAILABLE, "<html>gateway timeout</html>");
    assert!(msg.contains(FALLBACK_MESSAGE));
  }

  // --- URL building ---

  #[test]
  fn recommendations_url_encodes_the_title() {
    let url = recommendations_url("http://127.0.0.1:8000", "The Lord of the Rings").unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:8000/recommendations/The%20Lord%20of%20the%20Rings");
  }

  #[test]
  fn recommendations_url_handles_slashes_in_title() {
    let url = recommendations_url("http://localhost:8000", "Face/Off").unwrap();
    assert_eq!(url.as_str(), "http://localhost:8000/recommendations/Face%2FOff");
  }

  #[test]
  fn genres_url_appends_segment() {
    let url = genres_url("http://127.0.0.1:8000").unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:8000/genres");
  }

  #[test]
  fn poster_url_joins_path_fragment() {
    assert_eq!(poster_url("w500", "/abc.jpg"), "https://image.tmdb.org/t/p/w500/abc.jpg");
    assert_eq!(poster_url("w342", "abc.jpg"), "https://image.tmdb.org/t/p/w342/abc.jpg");
  }
}
