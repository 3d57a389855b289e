//! Terminal poster rendering.
//!
//! Capability ladder: Kitty graphics > Sixel > true-color half-blocks > ASCII.
//! The cell-based modes (half-block, ASCII) render through a ratatui widget;
//! the pixel protocols (Kitty, Sixel) bypass the buffer and write escape
//! sequences directly after each draw, keyed on (movie id, area) so an
//! unchanged poster is never re-transmitted.

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use clap::ValueEnum;
use color_quant::NeuQuant;
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};
use std::io::{Cursor, Write};

// --- Display mode ---

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Kitty,
  Sixel,
  Direct,
  Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
  Sixel,
  Kitty,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
      DisplayMode::Sixel => "Sixel",
      DisplayMode::Kitty => "Kitty",
    }
  }

  pub fn is_pixel_protocol(self) -> bool {
    matches!(self, DisplayMode::Kitty | DisplayMode::Sixel)
  }
}

/// Probe the environment for the best supported mode.
///
/// - Kitty: `TERM=xterm-kitty`, or kitty/WezTerm/ghostty as `TERM_PROGRAM`
/// - Sixel: foot/mlterm/contour, or `TERM` containing "sixel"
/// - Direct: `COLORTERM` claims truecolor
/// - Ascii: everything else
pub fn detect_display_mode() -> DisplayMode {
  let term = std::env::var("TERM").unwrap_or_default();
  let term_program = std::env::var("TERM_PROGRAM").unwrap_or_default().to_lowercase();

  if term == "xterm-kitty" || matches!(term_program.as_str(), "kitty" | "wezterm" | "ghostty") {
    return DisplayMode::Kitty;
  }
  if matches!(term_program.as_str(), "foot" | "mlterm" | "contour") || term.contains("sixel") {
    return DisplayMode::Sixel;
  }
  let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }
  DisplayMode::Ascii
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Kitty => DisplayMode::Kitty,
    CliDisplayMode::Sixel => DisplayMode::Sixel,
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}

// --- Poster widget (cell-based modes) ---

/// Renders a pre-resized poster into the buffer. In Kitty/Sixel modes this
/// widget is a no-op; the run loop transmits the image after the draw.
pub struct PosterWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

impl Widget for PosterWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_half_blocks(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
      DisplayMode::Kitty | DisplayMode::Sixel => {}
    }
  }
}

/// Clamp-and-offset helper: center `(w, h)` content inside `area` and return
/// the top-left cell.
fn centered_origin(area: Rect, w: u32, h: u32) -> (u16, u16) {
  let dx = (area.width as u32).saturating_sub(w) / 2;
  let dy = (area.height as u32).saturating_sub(h) / 2;
  (area.x.saturating_add(dx.min(u16::MAX as u32) as u16), area.y.saturating_add(dy.min(u16::MAX as u32) as u16))
}

fn render_half_blocks(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  // Caller resized already; each "▀" cell carries two vertical pixels.
  let rgb = image.to_rgb8();
  let w = rgb.width().min(area.width as u32);
  let rows = rgb.height().div_ceil(2).min(area.height as u32);
  let (ox, oy) = centered_origin(area, w, rows);

  for row in 0..rows {
    for x in 0..w {
      let top = rgb.get_pixel(x, row * 2);
      let fg = Color::Rgb(top[0], top[1], top[2]);
      let bg = if row * 2 + 1 < rgb.height() {
        let bottom = rgb.get_pixel(x, row * 2 + 1);
        Color::Rgb(bottom[0], bottom[1], bottom[2])
      } else {
        Color::Reset
      };
      let cell_x = ox.saturating_add(x.min(u16::MAX as u32) as u16);
      let cell_y = oy.saturating_add(row.min(u16::MAX as u32) as u16);
      buf.set_string(cell_x, cell_y, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let gray = image.to_luma8();
  let w = gray.width().min(area.width as u32);
  let h = gray.height().min(area.height as u32);
  let (ox, oy) = centered_origin(area, w, h);

  for y in 0..h {
    for x in 0..w {
      let level = gray.get_pixel(x, y)[0] as usize;
      let idx = (level * (ASCII_RAMP.len() - 1)) / 255;
      let ch = ASCII_RAMP[idx] as char;
      let cell_x = ox.saturating_add(x.min(u16::MAX as u32) as u16);
      let cell_y = oy.saturating_add(y.min(u16::MAX as u32) as u16);
      buf.set_string(cell_x, cell_y, ch.to_string(), Style::default());
    }
  }
}

// --- Kitty graphics protocol ---
//
// Transmit + place the poster with a fixed image/placement id (i=1, p=1) so
// re-sending replaces the previous poster atomically. The image is PNG
// encoded, base64'd, and chunked at 4096 bytes. `c`/`r` scale the image over
// the target cell area at the terminal's native pixel density.

const KITTY_CHUNK_SIZE: usize = 4096;

/// Remove every Kitty image we placed (used on exit and when leaving Ready).
pub fn kitty_delete_all() -> Result<()> {
  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B_Ga=d,d=a,q=2\x1B\\").context("Failed to write kitty delete-all")?;
  stdout.flush().context("Failed to flush kitty delete-all")?;
  Ok(())
}

/// Transmit `image` over the Kitty protocol, placed at `area`.
pub fn kitty_render_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  let mut png = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).context("Failed to encode poster as PNG")?;
  let b64 = BASE64.encode(&png);

  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B[{};{}H", area.y.saturating_add(1), area.x.saturating_add(1))
    .context("Failed to position cursor for kitty poster")?;

  let chunks: Vec<&[u8]> = b64.as_bytes().chunks(KITTY_CHUNK_SIZE).collect();
  let last = chunks.len().saturating_sub(1);
  for (i, chunk) in chunks.iter().enumerate() {
    let data = std::str::from_utf8(chunk).context("base64 chunk was not valid UTF-8")?;
    let more = if i < last { 1 } else { 0 };
    if i == 0 {
      write!(stdout, "\x1B_Ga=T,f=100,t=d,i=1,p=1,c={},r={},q=2,m={};{}\x1B\\", area.width, area.height, more, data)
        .context("Failed to write kitty poster header chunk")?;
    } else {
      write!(stdout, "\x1B_Gm={};{}\x1B\\", more, data).context("Failed to write kitty poster chunk")?;
    }
  }

  stdout.flush().context("Failed to flush kitty poster")?;
  Ok(())
}

// --- Sixel graphics protocol ---
//
// Each sixel row encodes 6 vertical pixels per character (offset 0x3F).
// Colors go through a NeuQuant-quantized 256-entry palette; runs longer than
// three cells use the `!<n><ch>` RLE form.

const SIXEL_MAX_COLORS: usize = 256;

fn sixel_palette(nq: &NeuQuant) -> Vec<[u8; 3]> {
  let map = nq.color_map_rgb();
  (0..SIXEL_MAX_COLORS)
    .map(|i| map.get(i * 3..i * 3 + 3).and_then(|s| s.try_into().ok()).unwrap_or([0, 0, 0]))
    .collect()
}

fn sixel_emit_row(out: &mut String, row_data: &[u8]) {
  let mut i = 0;
  while i < row_data.len() {
    let val = row_data[i];
    let ch = (val + 0x3F) as char;
    let mut run = 1usize;
    while i + run < row_data.len() && row_data[i + run] == val {
      run += 1;
    }
    if run > 3 {
      out.push_str(&format!("!{}{}", run, ch));
    } else {
      for _ in 0..run {
        out.push(ch);
      }
    }
    i += run;
  }
}

/// Transmit `image` over the Sixel protocol, scaled to fill `area`.
pub fn sixel_render_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  // Assume 8x16 pixel cells; posters are portrait so height dominates.
  let rgb = image
    .resize_to_fill(area.width as u32 * 8, area.height as u32 * 16, FilterType::Lanczos3)
    .into_rgb8();
  let (w, h) = (rgb.width() as usize, rgb.height() as usize);

  let rgba: Vec<u8> = rgb.pixels().flat_map(|p| [p[0], p[1], p[2], 255]).collect();
  let nq = NeuQuant::new(3, SIXEL_MAX_COLORS, &rgba);
  let palette = sixel_palette(&nq);
  // NeuQuant was built with 256 colors, so indices always fit in u8.
  let indices: Vec<u8> = rgb.pixels().map(|p| nq.index_of(&[p[0], p[1], p[2], 255]).min(u8::MAX as usize) as u8).collect();

  let mut out = String::with_capacity(w * h);
  out.push_str("\x1BPq");
  out.push_str(&format!("\"1;1;{};{}", w, h));
  for (i, c) in palette.iter().enumerate() {
    out.push_str(&format!(
      "#{};2;{};{};{}",
      i,
      (c[0] as u32 * 100) / 255,
      (c[1] as u32 * 100) / 255,
      (c[2] as u32 * 100) / 255
    ));
  }

  for band in 0..h.div_ceil(6) {
    let y_base = band * 6;
    for color in 0..palette.len() {
      let color = color.min(u8::MAX as usize) as u8;
      let mut any = false;
      let mut row_data = Vec::with_capacity(w);
      for x in 0..w {
        let mut bits: u8 = 0;
        for bit in 0..6 {
          let y = y_base + bit;
          if y < h
            && let Some(&idx) = indices.get(y * w + x)
            && idx == color
          {
            bits |= 1 << bit;
            any = true;
          }
        }
        row_data.push(bits);
      }
      if !any {
        continue;
      }
      out.push_str(&format!("#{}", color));
      sixel_emit_row(&mut out, &row_data);
      out.push('$');
    }
    out.push('-');
  }
  out.push_str("\x1B\\");

  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B[{};{}H{}", area.y.saturating_add(1), area.x.saturating_add(1), out)
    .context("Failed to write sixel poster")?;
  stdout.flush().context("Failed to flush sixel poster")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn centered_origin_centers_smaller_content() {
    let area = Rect { x: 10, y: 5, width: 20, height: 10 };
    assert_eq!(centered_origin(area, 10, 4), (15, 8));
  }

  #[test]
  fn centered_origin_pins_oversized_content() {
    let area = Rect { x: 2, y: 2, width: 8, height: 4 };
    assert_eq!(centered_origin(area, 20, 20), (2, 2));
  }

  #[test]
  fn sixel_rle_compresses_long_runs() {
    let mut out = String::new();
    sixel_emit_row(&mut out, &[1, 1, 1, 1, 1, 2, 2]);
    // 5x value 1 -> "!5@", 2x value 2 emitted literally as 'A'
    assert_eq!(out, "!5@AA");
  }

  #[test]
  fn sixel_rle_keeps_short_runs_literal() {
    let mut out = String::new();
    sixel_emit_row(&mut out, &[0, 0, 0]);
    assert_eq!(out, "???");
  }
}
