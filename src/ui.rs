use image::imageops::FilterType;
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, Padding, Paragraph, Wrap},
};

use crate::api::Movie;
use crate::app::{App, AppMode, ViewState};
use crate::constants::constants;
use crate::graphics::{DisplayMode, PosterWidget};
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn spinner_frame(app: &App) -> &'static str {
  let interval = constants().spinner_interval_ms.max(1);
  let tick = (app.started_at.elapsed().as_millis() as u64 / interval) as usize;
  SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

/// A rect of the given percentage size, centered inside `area`.
fn centered_rect(area: Rect, width_pct: u16, height_pct: u16) -> Rect {
  let [_, mid_v, _] = Layout::vertical([
    Constraint::Percentage((100 - height_pct) / 2),
    Constraint::Percentage(height_pct),
    Constraint::Percentage((100 - height_pct) / 2),
  ])
  .areas(area);
  let [_, mid, _] = Layout::horizontal([
    Constraint::Percentage((100 - width_pct) / 2),
    Constraint::Percentage(width_pct),
    Constraint::Percentage((100 - width_pct) / 2),
  ])
  .areas(mid_v);
  mid
}

/// "2010  ★ 8.3" — whichever parts the movie actually has.
fn meta_line(movie: &Movie) -> String {
  let mut parts = Vec::new();
  if let Some(year) = movie.release_year() {
    parts.push(year.to_string());
  }
  if let Some(rating) = movie.vote_average
    && rating > 0.0
  {
    parts.push(format!("★ {:.1}", rating));
  }
  parts.join("  ")
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  app.gfx.poster_area = None;

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);

  if app.mode == AppMode::Detail {
    render_detail_overlay(frame, app, main_area);
  }
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ⏵ reel ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  match app.view {
    ViewState::Idle => render_welcome(frame, app.theme(), area),
    ViewState::Loading => render_loading(frame, app, area),
    ViewState::Error(_) => render_error(frame, app, area),
    ViewState::Ready(_) => render_results(frame, app, area),
  }
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("⏵  Welcome to reel", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Find movies similar to the ones you love.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Type a movie title below and press Enter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text)
    .alignment(Alignment::Center)
    .block(Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)));
  frame.render_widget(paragraph, area);
}

fn render_loading(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let message = app.status_message.as_deref().unwrap_or("Searching…");
  let text = vec![
    Line::from(""),
    Line::from(Span::styled(format!("{} {}", spinner_frame(app), message), Style::default().fg(theme.status))),
    Line::from(""),
    Line::from(Span::styled("Asking the recommendation service…", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text)
    .alignment(Alignment::Center)
    .block(Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)));
  frame.render_widget(paragraph, area);
}

fn render_error(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let ViewState::Error(ref message) = app.view else { return };
  let text = vec![
    Line::from(""),
    Line::from(Span::styled(format!("⚠  {}", message), Style::default().fg(theme.error).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Press Enter to search again, or Esc to start over.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text)
    .alignment(Alignment::Center)
    .block(Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.error)));
  frame.render_widget(paragraph, area);
}

// --- Results ---

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let [filter_area, body_area] = Layout::vertical([Constraint::Length(1), Constraint::Min(3)]).areas(area);
  let [grid_area, side_area] =
    Layout::horizontal([Constraint::Percentage(68), Constraint::Percentage(32)]).areas(body_area);

  render_filter_bar(frame, app, filter_area);
  render_grid(frame, app, grid_area);
  render_side_pane(frame, app, side_area);
}

fn render_filter_bar(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(res) = app.result() else { return };
  let total = res.recommendations.len();
  let options = app.filter_options();

  let mut spans = vec![Span::styled(" Genre ", Style::default().fg(theme.muted))];
  for (i, option) in options.iter().enumerate() {
    let (label, count) = match option {
      None => ("All".to_string(), total),
      Some(id) => (app.genre_name(*id), app.counts.get(id).copied().unwrap_or(0)),
    };
    let text = format!(" {} ({}) ", label, count);

    let style = if app.mode == AppMode::Filter && i == app.filter_cursor {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
    } else if *option == app.selected_genre {
      Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.fg)
    };
    spans.push(Span::styled(text, style));
    spans.push(Span::raw(" "));
  }
  frame.render_widget(Line::from(spans), area);
}

fn render_grid(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let card_h = constants().card_height.max(3);

  let cols = ((area.width / constants().min_card_width.max(1)) as usize).clamp(1, constants().max_grid_columns);
  app.grid_columns = cols;
  let card_w = area.width / cols as u16;
  let rows_fit = (area.height / card_h).max(1) as usize;

  let Some(res) = app.result() else { return };
  let selected_row = app.selected / cols;
  let start_row = selected_row.saturating_sub(rows_fit.saturating_sub(1));

  for (slot, &movie_idx) in app.visible.iter().enumerate().skip(start_row * cols).take(rows_fit * cols) {
    let Some(movie) = res.recommendations.get(movie_idx) else { continue };
    let row = slot / cols - start_row;
    let col = slot % cols;
    let card = Rect {
      x: area.x + col as u16 * card_w,
      y: area.y + row as u16 * card_h,
      width: card_w,
      height: card_h,
    };

    let is_selected = slot == app.selected;
    let border = if is_selected { theme.accent } else { theme.border };
    let title_style = if is_selected {
      Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)
    };

    let inner_w = card.width.saturating_sub(4) as usize;
    let genres: Vec<String> = movie.genre_ids.iter().take(2).map(|&id| app.genre_name(id)).collect();
    let lines = vec![
      Line::from(Span::styled(truncate_str(&movie.title, inner_w), title_style)),
      Line::from(Span::styled(meta_line(movie), Style::default().fg(theme.muted))),
      Line::from(Span::styled(truncate_str(&genres.join(", "), inner_w), Style::default().fg(theme.muted))),
    ];

    let block = Block::bordered()
      .border_type(BorderType::Rounded)
      .border_style(Style::default().fg(border))
      .padding(Padding::horizontal(1));
    frame.render_widget(Paragraph::new(lines).block(block), card);
  }

  if app.visible.is_empty() {
    let empty = Paragraph::new(Line::from(Span::styled(
      "No movies match this genre.",
      Style::default().fg(theme.muted),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(empty, Rect { y: area.y + area.height / 2, height: 1, ..area });
  }
}

fn render_side_pane(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let searched = app.result().map(|r| r.searched_movie.title.clone()).unwrap_or_default();

  let title = Line::from(vec![
    Span::styled(" Similar to ", Style::default().fg(theme.muted)),
    Span::styled(format!("{} ", truncate_str(&searched, 24)), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
  ]);
  let block = Block::bordered()
    .title(title)
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [poster_area, info_area] = Layout::vertical([Constraint::Min(6), Constraint::Length(5)]).areas(inner);
  render_poster(frame, app, poster_area);
  render_selection_info(frame, app, info_area);
}

/// Fit a 2:3 portrait poster into `area`, assuming ~1:2 cell aspect.
fn poster_rect(area: Rect) -> Rect {
  let ideal_w = (area.height as u32 * 4 / 3).min(area.width as u32) as u16;
  let ideal_h = (ideal_w as u32 * 3 / 4).min(area.height as u32) as u16;
  Rect {
    x: area.x + area.width.saturating_sub(ideal_w) / 2,
    y: area.y + area.height.saturating_sub(ideal_h) / 2,
    width: ideal_w,
    height: ideal_h,
  }
}

fn render_poster(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  if area.is_empty() {
    return;
  }
  let target = poster_rect(area);

  let Some(movie_id) = app.selected_poster().map(|(id, _)| id) else {
    // No poster reference or fetch still pending/failed: placeholder card.
    let placeholder = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("▢", Style::default().fg(theme.muted))),
      Line::from(Span::styled("no poster", Style::default().fg(theme.muted))),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(placeholder, target);
    return;
  };

  if app.display_mode.is_pixel_protocol() {
    // Transmission happens after the draw, keyed on (movie id, area).
    app.gfx.poster_area = Some(target);
    return;
  }

  let needs_resize = match &app.gfx.resized {
    Some((id, w, h, _)) => *id != movie_id || *w != target.width || *h != target.height,
    None => true,
  };
  if needs_resize && let Some((_, image)) = app.selected_poster() {
    let target_w = target.width as u32;
    let target_h = match app.display_mode {
      // Half-blocks carry two pixels per cell row.
      DisplayMode::Direct => target.height as u32 * 2,
      _ => target.height as u32,
    };
    let resized = image.resize_to_fill(target_w.max(1), target_h.max(1), FilterType::Lanczos3);
    app.gfx.resized = Some((movie_id, target.width, target.height, resized));
  }

  if let Some((_, _, _, ref resized)) = app.gfx.resized {
    frame.render_widget(PosterWidget { image: resized, display_mode: app.display_mode }, target);
  }
}

fn render_selection_info(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(movie) = app.selected_movie() else { return };
  let inner_w = area.width as usize;

  let mut lines = vec![Line::from(Span::styled(
    truncate_str(&movie.title, inner_w),
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
  ))];
  let meta = meta_line(movie);
  if !meta.is_empty() {
    lines.push(Line::from(Span::styled(meta, Style::default().fg(theme.muted))));
  }
  if let Some(ref director) = movie.director {
    lines.push(Line::from(vec![
      Span::styled("Director  ", Style::default().fg(theme.muted)),
      Span::styled(truncate_str(director, inner_w.saturating_sub(10)), Style::default().fg(theme.fg)),
    ]));
  }
  lines.push(Line::from(Span::styled("Enter for details", Style::default().fg(theme.muted))));

  frame.render_widget(Paragraph::new(lines), area);
}

// --- Detail overlay ---

fn render_detail_overlay(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(movie) = app.selected_movie() else { return };
  let overlay = centered_rect(area, constants().overlay_width_pct, constants().overlay_height_pct);

  frame.render_widget(Clear, overlay);

  let title = Line::from(Span::styled(
    format!(" {} ", truncate_str(&movie.title, overlay.width.saturating_sub(4) as usize)),
    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
  ));
  let block = Block::bordered()
    .title(title)
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.accent))
    .padding(Padding::new(2, 2, 1, 1))
    .style(Style::default().bg(theme.stripe_bg));

  let mut meta_spans = Vec::new();
  if let Some(year) = movie.release_year() {
    meta_spans.push(Span::styled(year.to_string(), Style::default().fg(theme.fg)));
  }
  if let Some(ref director) = movie.director {
    if !meta_spans.is_empty() {
      meta_spans.push(Span::styled("  |  ", Style::default().fg(theme.border)));
    }
    meta_spans.push(Span::styled("Director: ", Style::default().fg(theme.muted)));
    meta_spans.push(Span::styled(director.clone(), Style::default().fg(theme.fg)));
  }
  if let Some(rating) = movie.vote_average
    && rating > 0.0
  {
    if !meta_spans.is_empty() {
      meta_spans.push(Span::styled("  |  ", Style::default().fg(theme.border)));
    }
    meta_spans.push(Span::styled(format!("★ {:.1} / 10", rating), Style::default().fg(theme.accent)));
  }

  let genres: Vec<String> = movie.genre_ids.iter().map(|&id| app.genre_name(id)).collect();

  let mut lines = vec![Line::from(meta_spans)];
  if !genres.is_empty() {
    lines.push(Line::from(Span::styled(genres.join(", "), Style::default().fg(theme.muted))));
  }
  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(
    movie.overview.clone().unwrap_or_else(|| "No synopsis available.".to_string()),
    Style::default().fg(theme.fg),
  )));

  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(block), overlay);
}

// --- Chrome ---

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if matches!(app.view, ViewState::Loading) {
    let message = app.status_message.as_deref().unwrap_or("Searching…");
    (format!(" {} {}", spinner_frame(app), message), Style::default().fg(theme.status))
  } else if let Some(res) = app.result() {
    let shown = app.visible.len();
    let total = res.recommendations.len();
    if shown == total {
      (format!(" {} recommendations", total), Style::default().fg(theme.muted))
    } else {
      (format!(" {} of {} recommendations", shown, total), Style::default().fg(theme.muted))
    }
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let disabled = app.in_flight();
  let border_color = if disabled {
    theme.muted
  } else if app.mode == AppMode::Input {
    theme.accent
  } else {
    theme.border
  };
  let title = if disabled { " Search a movie (searching…) " } else { " Search a movie " };
  let input_block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let fg = if disabled { theme.muted } else { theme.fg };
  let paragraph = Paragraph::new(visible).style(Style::default().fg(fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input && !disabled {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Search"), ("^t", "Theme")];
      if matches!(app.view, ViewState::Error(_)) {
        k.push(("Esc", "Dismiss"));
      } else {
        k.push(("Esc", "Quit"));
      }
      k
    }
    AppMode::Results => {
      vec![("←↓↑→", "Browse"), ("Enter", "Details"), ("g", "Genre"), ("^t", "Theme"), ("Esc", "New search")]
    }
    AppMode::Filter => vec![("←/→", "Choose genre"), ("Enter", "Apply"), ("Esc", "Cancel")],
    AppMode::Detail => vec![("Esc", "Close")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncate_leaves_short_strings_alone() {
    assert_eq!(truncate_str("Heat", 10), "Heat");
    assert_eq!(truncate_str("Heat", 4), "Heat");
  }

  #[test]
  fn truncate_appends_ellipsis() {
    assert_eq!(truncate_str("Interstellar", 6), "Inter…");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("abc", 3), 3);
    assert_eq!(display_width("千と千尋", 2), 4);
  }

  #[test]
  fn poster_rect_fits_inside_area() {
    let area = Rect { x: 0, y: 0, width: 30, height: 18 };
    let r = poster_rect(area);
    assert!(r.width <= area.width && r.height <= area.height);
    assert!(r.x >= area.x && r.y >= area.y);
  }
}
