use ratatui::style::Color;

/// A named color palette. Cycled with Ctrl+T; the active theme's name is
/// persisted to the prefs file.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub accent: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "marquee",
    bg: Color::Rgb(24, 20, 30),
    fg: Color::Rgb(228, 222, 236),
    muted: Color::Rgb(130, 122, 148),
    accent: Color::Rgb(186, 140, 255),
    border: Color::Rgb(70, 62, 88),
    highlight_fg: Color::Rgb(24, 20, 30),
    highlight_bg: Color::Rgb(186, 140, 255),
    stripe_bg: Color::Rgb(30, 26, 38),
    status: Color::Rgb(150, 200, 180),
    error: Color::Rgb(240, 120, 120),
    key_fg: Color::Rgb(24, 20, 30),
    key_bg: Color::Rgb(130, 122, 148),
  },
  Theme {
    name: "matinee",
    bg: Color::Rgb(250, 246, 240),
    fg: Color::Rgb(54, 48, 60),
    muted: Color::Rgb(150, 140, 134),
    accent: Color::Rgb(156, 80, 182),
    border: Color::Rgb(210, 200, 192),
    highlight_fg: Color::Rgb(250, 246, 240),
    highlight_bg: Color::Rgb(156, 80, 182),
    stripe_bg: Color::Rgb(242, 236, 228),
    status: Color::Rgb(60, 140, 110),
    error: Color::Rgb(190, 60, 70),
    key_fg: Color::Rgb(250, 246, 240),
    key_bg: Color::Rgb(150, 140, 134),
  },
  Theme {
    name: "noir",
    bg: Color::Rgb(14, 14, 16),
    fg: Color::Rgb(214, 214, 214),
    muted: Color::Rgb(110, 110, 116),
    accent: Color::Rgb(230, 200, 110),
    border: Color::Rgb(58, 58, 64),
    highlight_fg: Color::Rgb(14, 14, 16),
    highlight_bg: Color::Rgb(230, 200, 110),
    stripe_bg: Color::Rgb(20, 20, 24),
    status: Color::Rgb(160, 190, 160),
    error: Color::Rgb(225, 110, 100),
    key_fg: Color::Rgb(14, 14, 16),
    key_bg: Color::Rgb(110, 110, 116),
  },
];
