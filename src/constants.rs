//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Recommendation service
  pub api_base_url: String,
  pub request_timeout_secs: u64,

  // Poster image host
  pub image_base_url: String,
  pub poster_sizes: Vec<String>,

  // Results grid
  pub min_card_width: u16,
  pub max_grid_columns: usize,
  pub card_height: u16,

  // Detail overlay
  pub overlay_width_pct: u16,
  pub overlay_height_pct: u16,

  pub spinner_interval_ms: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
