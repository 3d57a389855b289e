use anyhow::Result;
use image::DynamicImage;
use ratatui::layout::Rect;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::api::{self, Movie, RecommendationResult};
use crate::config::Config;
use crate::filter;
use crate::graphics::DisplayMode;
use crate::theme::{THEMES, Theme};

/// The mutually-exclusive top-level UI state. Exactly one is active;
/// `Ready` owns the current result wholesale and is replaced, never mutated.
pub enum ViewState {
  Idle,
  Loading,
  Error(String),
  Ready(RecommendationResult),
}

/// Which part of the screen has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
  Filter,
  Detail,
}

/// Terminal graphics protocol rendering state (Kitty/Sixel).
#[derive(Default)]
pub struct GraphicsCache {
  /// Where the poster should be placed this frame, set during rendering.
  pub poster_area: Option<Rect>,
  /// (movie id, area) of the last transmitted poster, to skip re-sends.
  pub last_sent: Option<(u64, Rect)>,
  /// Resize cache for the cell-based modes, keyed by movie id and area size.
  pub resized: Option<(u64, u16, u16, DynamicImage)>,
}

/// In-flight async task receivers, polled once per frame.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) search_rx: Option<oneshot::Receiver<Result<RecommendationResult>>>,
  pub(crate) genres_rx: Option<oneshot::Receiver<Result<HashMap<u32, String>>>>,
  pub(crate) poster_rx: Option<oneshot::Receiver<(u64, Result<DynamicImage>)>>,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub view: ViewState,
  /// Set when the title lookup is dispatched, cleared only after the
  /// terminal Ready/Error state is applied. While set, the search input is
  /// disabled — that is the guard against racing submissions.
  in_flight: bool,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub http_client: Client,
  pub api_base: String,
  /// Genre id → display name, from the independent `/genres` lookup.
  /// Stays empty when that lookup fails; display degrades to raw ids.
  pub genres: HashMap<u32, String>,
  genres_failed: bool,
  /// Current genre filter; `None` means "all". Only meaningful while Ready,
  /// reset whenever a new result arrives.
  pub selected_genre: Option<u32>,
  /// Indices into the recommendation list visible under `selected_genre`.
  pub visible: Vec<usize>,
  /// Per-genre membership counts for the current recommendations.
  pub counts: BTreeMap<u32, usize>,
  /// Position within `visible` of the highlighted card.
  pub selected: usize,
  /// Position within `filter_options()` while the filter bar has focus.
  pub filter_cursor: usize,
  /// Column count of the grid as last laid out; written by the renderer,
  /// read by key handling for 2D navigation.
  pub grid_columns: usize,
  pub status_message: Option<String>,
  pub should_quit: bool,
  pub posters: HashMap<u64, DynamicImage>,
  poster_failed: HashSet<u64>,
  pub gfx: GraphicsCache,
  pub(crate) tasks: AsyncTasks,
  /// App start instant, drives the loading spinner.
  pub started_at: Instant,
}

impl App {
  pub fn new(display_mode: DisplayMode, api_base: String) -> Self {
    let config = Config::load();
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };

    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Input,
      view: ViewState::Idle,
      in_flight: false,
      theme_index,
      display_mode,
      http_client: api::new_client(),
      api_base,
      genres: HashMap::new(),
      genres_failed: false,
      selected_genre: None,
      visible: Vec::new(),
      counts: BTreeMap::new(),
      selected: 0,
      filter_cursor: 0,
      grid_columns: 1,
      status_message: None,
      should_quit: false,
      posters: HashMap::new(),
      poster_failed: HashSet::new(),
      gfx: GraphicsCache::default(),
      tasks: AsyncTasks::default(),
      started_at: Instant::now(),
    }
  }

  pub fn theme(&self) -> &'static Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&self) {
    Config { theme_name: Some(self.theme().name.to_string()) }.save();
  }

  pub fn in_flight(&self) -> bool {
    self.in_flight
  }

  // --- View-state transitions ---

  /// Validate a submission and transition to Loading. Returns the trimmed
  /// query to dispatch, or `None` when nothing should happen: blank input is
  /// a silent no-op, and Loading/Ready states don't accept submissions.
  fn begin_search(&mut self) -> Option<String> {
    if self.in_flight || matches!(self.view, ViewState::Loading | ViewState::Ready(_)) {
      return None;
    }
    let query = self.input.trim().to_string();
    if query.is_empty() {
      return None;
    }

    self.selected_genre = None;
    self.filter_cursor = 0;
    self.visible.clear();
    self.counts.clear();
    self.selected = 0;
    self.view = ViewState::Loading;
    self.in_flight = true;
    Some(query)
  }

  /// Submit the current input: transition to Loading and dispatch the title
  /// lookup on a background task.
  pub fn trigger_search(&mut self) {
    let Some(query) = self.begin_search() else { return };
    info!(query = %query, "search submitted");
    self.status_message = Some(format!("Searching '{}'…", query));

    let client = self.http_client.clone();
    let base = self.api_base.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api::fetch_recommendations(&client, &base, &query).await);
    });
    self.tasks.search_rx = Some(rx);

    // The genre mapping is independent of the title lookup; retry a failed
    // startup fetch alongside the search so names can still appear.
    if self.genres.is_empty() && self.genres_failed && self.tasks.genres_rx.is_none() {
      self.trigger_genre_fetch();
    }
  }

  /// Apply the outcome of a title lookup. Exactly one of Ready/Error is
  /// entered, and the in-flight flag is cleared only afterwards so the UI
  /// can never observe Loading combined with a terminal state.
  fn finish_search(&mut self, result: Result<RecommendationResult>) {
    self.status_message = None;
    match result {
      Ok(res) if res.recommendations.is_empty() => {
        info!(title = %res.searched_movie.title, "lookup succeeded but had no recommendations");
        self.view = ViewState::Error(format!("No similar movies found for '{}'.", res.searched_movie.title));
      }
      Ok(res) => {
        info!(title = %res.searched_movie.title, count = res.recommendations.len(), "recommendations ready");
        self.counts = filter::genre_counts(&res.recommendations);
        self.selected_genre = None;
        self.visible = filter::compute_visible(&res.recommendations, None);
        self.selected = 0;
        self.filter_cursor = 0;
        self.view = ViewState::Ready(res);
        self.mode = AppMode::Results;
      }
      Err(e) => {
        warn!(err = %e, "lookup failed");
        self.view = ViewState::Error(e.to_string());
      }
    }
    self.in_flight = false;
  }

  /// Return to Idle from Error or Ready, dropping the stored result/error
  /// and the filter selection. No-op from Loading: lookups aren't
  /// cancellable, the disabled input is the guard instead.
  pub fn go_back(&mut self) {
    match self.view {
      ViewState::Loading | ViewState::Idle => {}
      ViewState::Error(_) | ViewState::Ready(_) => {
        self.view = ViewState::Idle;
        self.selected_genre = None;
        self.filter_cursor = 0;
        self.visible.clear();
        self.counts.clear();
        self.selected = 0;
        self.mode = AppMode::Input;
        self.gfx.resized = None;
      }
    }
  }

  // --- Async polling ---

  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut rx) = self.tasks.search_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.finish_search(result);
          self.ensure_selected_poster();
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.search_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.finish_search(Err(anyhow::anyhow!(api::FALLBACK_MESSAGE)));
        }
      }
    }

    if let Some(mut rx) = self.tasks.genres_rx.take() {
      match rx.try_recv() {
        Ok(Ok(map)) => {
          info!(genres = map.len(), "genre mapping loaded");
          self.genres = map;
          self.genres_failed = false;
        }
        Ok(Err(e)) => {
          // Non-fatal: results render with raw genre ids.
          warn!(err = %e, "genre mapping unavailable");
          self.genres_failed = true;
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.genres_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          warn!("genre fetch task dropped");
          self.genres_failed = true;
        }
      }
    }

    if let Some(mut rx) = self.tasks.poster_rx.take() {
      match rx.try_recv() {
        Ok((id, Ok(image))) => {
          self.posters.insert(id, image);
          // The selection may have moved while this poster was in flight.
          self.ensure_selected_poster();
        }
        Ok((id, Err(e))) => {
          warn!(movie_id = id, err = %e, "poster fetch failed");
          self.poster_failed.insert(id);
          self.ensure_selected_poster();
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.poster_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {}
      }
    }

    Ok(())
  }

  /// Dispatch the genre mapping lookup. Called once at startup; failure is
  /// logged and ignored.
  pub fn trigger_genre_fetch(&mut self) {
    let client = self.http_client.clone();
    let base = self.api_base.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api::fetch_genres(&client, &base).await);
    });
    self.tasks.genres_rx = Some(rx);
  }

  /// Spawn a poster fetch for the highlighted movie if we don't already
  /// have (or have given up on) its image. At most one fetch runs at a time.
  pub fn ensure_selected_poster(&mut self) {
    if self.tasks.poster_rx.is_some() {
      return;
    }
    let Some(movie) = self.selected_movie() else { return };
    let Some(path) = movie.poster_path.clone() else { return };
    let id = movie.id;
    if self.posters.contains_key(&id) || self.poster_failed.contains(&id) {
      return;
    }

    let client = self.http_client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = api::fetch_poster(&client, &path).await;
      let _ = tx.send((id, result));
    });
    self.tasks.poster_rx = Some(rx);
  }

  // --- Results access ---

  pub fn result(&self) -> Option<&RecommendationResult> {
    match self.view {
      ViewState::Ready(ref res) => Some(res),
      _ => None,
    }
  }

  /// The movie under the grid cursor, resolved through the visible indices.
  pub fn selected_movie(&self) -> Option<&Movie> {
    let res = self.result()?;
    let &idx = self.visible.get(self.selected)?;
    res.recommendations.get(idx)
  }

  /// The cached poster for the highlighted movie, keyed by movie id.
  pub fn selected_poster(&self) -> Option<(u64, &DynamicImage)> {
    let movie = self.selected_movie()?;
    self.posters.get(&movie.id).map(|img| (movie.id, img))
  }

  pub fn genre_name(&self, id: u32) -> String {
    self.genres.get(&id).cloned().unwrap_or_else(|| id.to_string())
  }

  // --- Genre filter ---

  /// Filter bar entries: "all" first, then every genre with a nonzero count
  /// in stable id order.
  pub fn filter_options(&self) -> Vec<Option<u32>> {
    let mut options = vec![None];
    options.extend(self.counts.keys().copied().map(Some));
    options
  }

  /// Apply a genre selection and recompute the visible set, clamping the
  /// grid cursor into range.
  pub fn apply_filter(&mut self, selection: Option<u32>) {
    self.selected_genre = selection;
    if let ViewState::Ready(ref res) = self.view {
      self.visible = filter::compute_visible(&res.recommendations, selection);
    }
    if self.selected >= self.visible.len() {
      self.selected = self.visible.len().saturating_sub(1);
    }
  }

  /// Position of the active selection within `filter_options()`.
  pub fn current_filter_index(&self) -> usize {
    self.filter_options().iter().position(|&o| o == self.selected_genre).unwrap_or(0)
  }

  // --- Grid navigation ---

  /// Move the grid cursor by whole cards: `dx` within a row, `dy` across
  /// rows (one row = `grid_columns` cards). Clamped to the visible set.
  pub fn move_selection(&mut self, dx: isize, dy: isize) {
    if self.visible.is_empty() {
      return;
    }
    let cols = self.grid_columns.max(1) as isize;
    let current = self.selected as isize;
    let next = (current + dx + dy * cols).clamp(0, self.visible.len() as isize - 1);
    self.selected = next as usize;
    self.ensure_selected_poster();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn make_app() -> App {
    App::new(DisplayMode::Ascii, "http://127.0.0.1:8000".to_string())
  }

  fn movie(id: u64, title: &str, genre_ids: &[u32]) -> Movie {
    serde_json::from_str(&format!(r#"{{"id": {}, "title": {:?}, "genre_ids": {:?}}}"#, id, title, genre_ids)).unwrap()
  }

  fn inception_result() -> RecommendationResult {
    RecommendationResult {
      searched_movie: movie(1, "Inception", &[28, 878]),
      recommendations: vec![
        movie(2, "Interstellar", &[878, 18]),
        movie(3, "Memento", &[53]),
        movie(4, "Tenet", &[878, 28]),
        movie(5, "Following", &[]),
      ],
    }
  }

  // --- submit ---

  #[test]
  fn blank_query_is_a_silent_no_op() {
    let mut app = make_app();
    app.input = "   ".to_string();
    assert!(app.begin_search().is_none());
    assert!(matches!(app.view, ViewState::Idle));
    assert!(!app.in_flight());
  }

  #[test]
  fn empty_query_is_a_silent_no_op() {
    let mut app = make_app();
    assert!(app.begin_search().is_none());
    assert!(matches!(app.view, ViewState::Idle));
  }

  #[test]
  fn non_empty_query_enters_loading_synchronously() {
    let mut app = make_app();
    app.input = "  Inception  ".to_string();
    assert_eq!(app.begin_search().as_deref(), Some("Inception"));
    assert!(matches!(app.view, ViewState::Loading));
    assert!(app.in_flight());
  }

  #[test]
  fn submission_ignored_while_loading() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    assert!(app.begin_search().is_some());
    assert!(app.begin_search().is_none());
  }

  #[test]
  fn submission_allowed_again_from_error() {
    let mut app = make_app();
    app.input = "zzzznotamovie".to_string();
    app.begin_search().unwrap();
    app.finish_search(Err(anyhow::anyhow!("Movie not found")));
    app.input = "Inception".to_string();
    assert!(app.begin_search().is_some());
    assert!(matches!(app.view, ViewState::Loading));
  }

  // --- resolution ---

  #[test]
  fn success_enters_ready_with_filter_reset() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.selected_genre = Some(999); // stale selection must not survive
    app.finish_search(Ok(inception_result()));

    let ViewState::Ready(ref res) = app.view else { panic!("expected Ready") };
    assert_eq!(res.searched_movie.title, "Inception");
    assert!(!res.recommendations.is_empty());
    assert_eq!(app.selected_genre, None);
    assert_eq!(app.visible, vec![0, 1, 2, 3]);
    assert_eq!(app.selected, 0);
    assert!(!app.in_flight());
    assert_eq!(app.mode, AppMode::Results);
  }

  #[test]
  fn failure_enters_error_with_exact_message() {
    let mut app = make_app();
    app.input = "zzzznotamovie".to_string();
    app.begin_search().unwrap();
    app.finish_search(Err(anyhow::anyhow!("Movie not found")));

    let ViewState::Error(ref msg) = app.view else { panic!("expected Error") };
    assert_eq!(msg, "Movie not found");
    assert!(!app.in_flight());
  }

  #[test]
  fn empty_recommendation_list_is_an_error() {
    let mut app = make_app();
    app.input = "Obscurity".to_string();
    app.begin_search().unwrap();
    app.finish_search(Ok(RecommendationResult {
      searched_movie: movie(9, "Obscurity", &[]),
      recommendations: vec![],
    }));
    assert!(matches!(app.view, ViewState::Error(_)));
  }

  // --- go_back ---

  #[test]
  fn go_back_resets_error_to_idle() {
    let mut app = make_app();
    app.input = "x".to_string();
    app.begin_search().unwrap();
    app.finish_search(Err(anyhow::anyhow!("Movie not found")));
    app.go_back();
    assert!(matches!(app.view, ViewState::Idle));
    assert_eq!(app.mode, AppMode::Input);
  }

  #[test]
  fn go_back_drops_stale_results() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.finish_search(Ok(inception_result()));
    app.go_back();
    assert!(matches!(app.view, ViewState::Idle));
    assert!(app.result().is_none());
    assert!(app.visible.is_empty());
    assert!(app.counts.is_empty());
  }

  #[test]
  fn go_back_is_a_no_op_while_loading() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.go_back();
    assert!(matches!(app.view, ViewState::Loading));
    assert!(app.in_flight());
  }

  // --- filtering ---

  #[test]
  fn counted_genre_narrows_and_all_restores() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.finish_search(Ok(inception_result()));

    assert_eq!(app.counts.get(&878), Some(&2));
    app.apply_filter(Some(878));
    assert_eq!(app.visible, vec![0, 2]); // Interstellar, Tenet
    assert!(!app.visible.is_empty());

    app.apply_filter(None);
    assert_eq!(app.visible, vec![0, 1, 2, 3]);
  }

  #[test]
  fn filter_clamps_grid_cursor() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.finish_search(Ok(inception_result()));
    app.selected = 3;
    app.apply_filter(Some(53)); // only Memento
    assert_eq!(app.visible, vec![1]);
    assert_eq!(app.selected, 0);
  }

  #[test]
  fn filter_options_list_all_then_counted_genres() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.finish_search(Ok(inception_result()));
    assert_eq!(app.filter_options(), vec![None, Some(18), Some(28), Some(53), Some(878)]);
  }

  // --- genre names ---

  #[test]
  fn genre_name_degrades_to_raw_id() {
    let mut app = make_app();
    app.genres.insert(28, "Action".to_string());
    assert_eq!(app.genre_name(28), "Action");
    assert_eq!(app.genre_name(878), "878");
  }

  // --- grid navigation ---

  #[test]
  fn move_selection_is_clamped() {
    let mut app = make_app();
    app.input = "Inception".to_string();
    app.begin_search().unwrap();
    app.finish_search(Ok(inception_result()));
    app.grid_columns = 2;

    app.move_selection(-1, 0);
    assert_eq!(app.selected, 0);
    app.move_selection(0, 1);
    assert_eq!(app.selected, 2);
    app.move_selection(0, 5);
    assert_eq!(app.selected, 3);
  }
}
