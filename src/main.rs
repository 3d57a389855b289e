mod api;
mod app;
mod config;
mod constants;
mod filter;
mod graphics;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;

use app::App;
use constants::constants;
use graphics::{CliDisplayMode, DisplayMode, kitty_delete_all, kitty_render_image, sixel_render_image};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Find similar movies in the terminal", long_about = None)]
struct Args {
  /// Display mode: 'auto', 'kitty', 'sixel', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Base URL of the recommendation service (overrides the built-in default)
  #[arg(long)]
  api_url: Option<String>,

  /// Print shell completions and exit
  #[arg(long, value_enum, hide = true)]
  completions: Option<Shell>,
}

// --- Logging ---

/// Route tracing output to a file under the user data dir; stdout belongs to
/// the TUI. Returns the appender guard, which must stay alive for the
/// duration of the program.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "reel")?;
  let log_dir = proj_dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "reel.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "reel=info".into());
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "reel", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_logging();

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let display_mode = graphics::resolve_display_mode(args.display_mode);
  let api_base = args.api_url.unwrap_or_else(|| constants().api_base_url.clone());
  info!(display = display_mode.label(), api = %api_base, "starting");

  let mut app = App::new(display_mode, api_base);
  // The genre mapping is independent of any search; fetch it once up front.
  // If it fails, results still render with raw genre ids.
  app.trigger_genre_fetch();

  loop {
    app.check_pending().await?;

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if display_mode.is_pixel_protocol() {
      if let Some(area) = app.gfx.poster_area {
        if let Some((movie_id, image)) = app.selected_poster() {
          let key = (movie_id, area);
          if app.gfx.last_sent != Some(key) {
            if display_mode == DisplayMode::Kitty {
              kitty_delete_all()?;
              kitty_render_image(image, area)?;
            } else {
              sixel_render_image(image, area)?;
            }
            app.gfx.last_sent = Some(key);
          }
        }
      } else if app.gfx.last_sent.is_some() {
        if display_mode == DisplayMode::Kitty {
          kitty_delete_all()?;
        }
        app.gfx.last_sent = None;
      }
    }

    if event::poll(Duration::from_millis(100)).context("Failed to poll terminal events")? {
      match event::read().context("Failed to read terminal event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key)?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  if display_mode == DisplayMode::Kitty {
    kitty_delete_all()?;
  }
  Ok(())
}
