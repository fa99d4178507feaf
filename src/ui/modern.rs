//! Terminal mini-player.
//!
//! The event loop uses `tokio::select!` to handle:
//! - Push events from the observation layer
//! - User keyboard input (controls, lyrics panel, open/close, quit)
//! - Open/closed and connection status changes
//! - A 1 s tick that re-reads time and progress while open
//! - The end of a lyrics cross-fade

use crate::app::App;
use crate::extractor::Command;
use crate::lifecycle::LinkState;
use crate::protocol::{Request, RequestClient, Response};
use crate::text_utils::{pad_centered, truncate, wrap_text};
use crate::ui::sink::{self, Action, LyricsPanel, MiniPlayer};
use crate::ui::styles::PlayerStyles;
use crossterm::{
    event::Event,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Gauge, Paragraph},
};
use std::io;
use std::pin::Pin;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::time::Sleep;

const HELP: &str = "space play  n/b skip  ←/→ seek  y lyrics  m close  q quit";

#[derive(Debug, Clone, Copy)]
pub struct ViewConfig {
    pub width: u16,
    pub height: u16,
    pub transitions: bool,
}

/// Run the mini-player until the user quits.
pub async fn display_mini_player(
    app: &App,
    config: ViewConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut events = app.bus().subscribe();
    let mut visible = app.visibility();
    let mut status = app.lifecycle().watch_status();
    let client = app.client();

    enable_raw_mode().map_err(to_boxed_err)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(to_boxed_err)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(to_boxed_err)?;
    let styles = PlayerStyles::default();
    let mut player = MiniPlayer::new(config.transitions);
    player.connection = app.lifecycle().status();

    // Single OS thread polling crossterm and forwarding into the runtime.
    let (event_tx, mut event_rx) = mpsc::channel(32);
    thread::spawn(move || {
        loop {
            match crossterm::event::poll(Duration::from_millis(100)) {
                Ok(true) => match crossterm::event::read() {
                    Ok(ev) => {
                        if event_tx.try_send(ev).is_err() && event_tx.is_closed() {
                            break;
                        }
                    }
                    Err(_) => {}
                },
                Ok(false) => {}
                Err(_) => thread::sleep(Duration::from_millis(100)),
            }
        }
    });

    draw(&mut terminal, &player, &styles, &config)?;
    // Opening on launch goes through the same path as the toggle key.
    request(&client, Request::ToggleMiniPlayer { preferred_mode: None }, &mut player).await;

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut fade: Option<Pin<Box<Sleep>>> = None;

    while !player.should_exit {
        tokio::select! {
            biased;

            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => process_event(event, app, &client, &mut player).await,
                    None => player.should_exit = true,
                }
            }

            changed = visible.changed() => {
                if changed.is_err() {
                    player.should_exit = true;
                } else {
                    let open = *visible.borrow_and_update();
                    set_open(open, app, &client, &mut player).await;
                }
            }

            event = events.recv() => match event {
                Ok(event) => {
                    if player.open {
                        player.apply(&event, Instant::now());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Mini-player fell behind, resyncing");
                    if let Some(track) = app.bus().latest_track() {
                        player.track = track;
                    }
                }
                Err(RecvError::Closed) => player.should_exit = true,
            },

            changed = status.changed() => {
                if changed.is_ok() {
                    player.connection = status.borrow_and_update().clone();
                }
            }

            _ = tick.tick() => {
                player.connection = app.lifecycle().status();
                if player.open
                    && let Some(extractor) = app.lifecycle().extractor()
                {
                    player.refresh_progress(&extractor.progress_sample());
                }
            }

            _ = async {
                if let Some(s) = &mut fade {
                    s.as_mut().await;
                } else {
                    futures_util::future::pending::<()>().await;
                }
            } => {
                fade = None;
            }
        }
        draw(&mut terminal, &player, &styles, &config)?;
        fade = player
            .lyrics
            .transition_deadline(Instant::now())
            .map(|at| Box::pin(tokio::time::sleep_until(tokio::time::Instant::from_std(at))));
    }
    disable_raw_mode().map_err(to_boxed_err)?;
    execute!(io::stdout(), LeaveAlternateScreen).map_err(to_boxed_err)?;
    Ok(())
}

/// Handle user input events (keyboard)
async fn process_event(event: Event, app: &App, client: &RequestClient, player: &mut MiniPlayer) {
    let Event::Key(key) = event else {
        return;
    };
    let Some(action) = sink::action_for(key) else {
        return;
    };
    if !player.open && !matches!(action, Action::ToggleMiniPlayer | Action::Quit) {
        return;
    }
    match action {
        Action::Quit => player.should_exit = true,
        Action::Command(command) => execute(app, command, player),
        Action::SeekBy(delta) => execute(app, Command::SeekTo(player.seek_target(delta)), player),
        Action::ToggleLyrics => {
            let open = !player.lyrics_open;
            player.set_lyrics_open(open);
            let req = if open { Request::StartLyricsObserving } else { Request::StopLyricsObserving };
            request(client, req, player).await;
        }
        Action::ToggleMiniPlayer => {
            request(client, Request::ToggleMiniPlayer { preferred_mode: None }, player).await;
        }
    }
}

fn execute(app: &App, command: Command, player: &mut MiniPlayer) {
    let done = app.lifecycle().extractor().is_some_and(|e| e.execute(command));
    if !done {
        player.flash(format!("Control unavailable: {}", command.label()), Instant::now());
    }
}

async fn set_open(open: bool, app: &App, client: &RequestClient, player: &mut MiniPlayer) {
    if player.open == open {
        return;
    }
    player.open = open;
    if open {
        // Start from the last full snapshot rather than waiting for a change.
        if let Some(track) = app.bus().latest_track() {
            player.track = track;
        }
        if player.lyrics_open {
            player.set_lyrics_open(true);
            request(client, Request::StartLyricsObserving, player).await;
        }
    } else if player.lyrics_open {
        request(client, Request::StopLyricsObserving, player).await;
    }
}

/// Send `req`, surfacing any failure as a status message.
async fn request(client: &RequestClient, req: Request, player: &mut MiniPlayer) -> Option<Response> {
    match client.send(req).await {
        Ok(response) if response.success => Some(response),
        Ok(response) => {
            let mut message = response.error.unwrap_or_else(|| "Request failed".to_string());
            if let Some(suggestion) = response.suggestion {
                message = format!("{message}. {suggestion}");
            }
            player.flash(message, Instant::now());
            None
        }
        Err(e) => {
            player.flash(e.to_string(), Instant::now());
            None
        }
    }
}

fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    player: &MiniPlayer,
    styles: &PlayerStyles,
    config: &ViewConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Instant::now();
    terminal
        .draw(|f| render(f, player, styles, config, now))
        .map_err(to_boxed_err)?;
    Ok(())
}

fn render(f: &mut Frame, player: &MiniPlayer, styles: &PlayerStyles, config: &ViewConfig, now: Instant) {
    let screen = f.area();
    let Some(area) = sink::player_area(screen, config.width, config.height) else {
        let lines = wrap_text("Terminal too small", screen.width as usize)
            .into_iter()
            .map(|l| Line::styled(l, styles.warning))
            .collect::<Vec<_>>();
        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), screen);
        return;
    };

    if !player.open {
        let mut lines = vec![Line::from("Mini-player closed")];
        lines.extend(
            wrap_text("press m to open, q to quit", area.width as usize)
                .into_iter()
                .map(|l| Line::styled(l, styles.dim)),
        );
        if let Some(message) = player.status_message(now) {
            lines.extend(wrap_text(message, area.width as usize).into_iter().map(|l| Line::styled(l, styles.status)));
        }
        let top = area.height.saturating_sub(lines.len() as u16) / 2;
        let inner = Rect { y: area.y + top, height: area.height - top, ..area };
        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
        return;
    }

    let (label, label_style) = connection_label(player, styles);
    let block = Block::bordered()
        .title(" pip-mirror ")
        .title(Line::styled(format!(" {label} "), label_style).right_aligned());
    let inner = block.inner(area);
    f.render_widget(block, area);
    let width = inner.width as usize;

    let lyrics_rows = if player.lyrics_open { 2 } else { 0 };
    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(lyrics_rows),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .split(inner);

    let track = &player.track;
    f.render_widget(Paragraph::new(Line::styled(truncate(&track.title, width), styles.title)), rows[0]);
    f.render_widget(Paragraph::new(Line::styled(truncate(&track.artist, width), styles.artist)), rows[1]);
    f.render_widget(Paragraph::new(indicators(player, styles)), rows[2]);

    let gauge = Gauge::default()
        .gauge_style(styles.gauge)
        .ratio((track.progress_percent / 100.0).clamp(0.0, 1.0))
        .label(format!("{} / {}", track.current_time, track.duration));
    f.render_widget(gauge, rows[3]);
    f.render_widget(
        Paragraph::new(Line::styled(remaining_label(&track.remaining_time), styles.dim)).alignment(Alignment::Right),
        rows[4],
    );

    if player.lyrics_open {
        f.render_widget(Paragraph::new(lyrics_lines(player, styles, width, now)), rows[5]);
    }

    let footer = match player.status_message(now) {
        Some(message) => Line::styled(truncate(message, width), styles.status),
        None => Line::styled(truncate(HELP, width), styles.dim),
    };
    f.render_widget(Paragraph::new(footer), rows[7]);
}

/// Countdown readout; the page may already prefix it with `-`.
fn remaining_label(remaining: &str) -> String {
    let remaining = remaining.trim();
    format!("-{}", remaining.strip_prefix('-').unwrap_or(remaining))
}

fn connection_label(player: &MiniPlayer, styles: &PlayerStyles) -> (String, Style) {
    let status = &player.connection;
    match status.state {
        LinkState::Healthy => ("● live".to_string(), styles.accent),
        LinkState::Initializing => ("… connecting".to_string(), styles.status),
        LinkState::Unhealthy => (format!("⚠ retry {}", status.retry_count), styles.warning),
        LinkState::DegradedPeriodicRetry => ("⚠ degraded".to_string(), styles.warning),
        LinkState::Uninitialized => ("○ offline".to_string(), styles.dim),
    }
}

fn indicators(player: &MiniPlayer, styles: &PlayerStyles) -> Line<'static> {
    let track = &player.track;
    let on_off = |on: bool| if on { styles.accent } else { styles.dim };
    Line::from(vec![
        Span::styled(if track.is_playing { "▶ playing" } else { "⏸ paused" }, on_off(track.is_playing)),
        Span::raw("  "),
        Span::styled(if track.is_liked { "♥" } else { "♡" }, on_off(track.is_liked)),
        Span::raw("  "),
        Span::styled("⤮ shuffle", on_off(track.is_shuffled)),
        Span::raw("  "),
        Span::styled(
            format!("↻ {}", track.repeat_mode.as_str()),
            on_off(track.repeat_mode != crate::state::RepeatMode::None),
        ),
    ])
}

fn lyrics_lines(player: &MiniPlayer, styles: &PlayerStyles, width: usize, now: Instant) -> Vec<Line<'static>> {
    let slot = |text: &str, style: Style| Line::styled(pad_centered(&truncate(text, width), width), style);
    match player.lyrics.panel() {
        LyricsPanel::Loading => vec![slot(sink::LOADING, styles.dim)],
        LyricsPanel::Unavailable => vec![slot(sink::NO_LYRICS, styles.current), slot(sink::NO_LYRICS_HINT, styles.dim)],
        LyricsPanel::Lines { current, next } => {
            let current_style = match player.lyrics.transition_progress(now) {
                Some(p) if p < 0.5 => styles.fading_in,
                _ => styles.current,
            };
            vec![slot(current, current_style), slot(next.as_deref().unwrap_or(""), styles.next)]
        }
    }
}

fn to_boxed_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LyricsState, TrackState};
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    fn config() -> ViewConfig {
        ViewConfig { width: 48, height: 12, transitions: true }
    }

    #[test]
    fn remaining_time_carries_a_single_minus() {
        assert_eq!(remaining_label("2:37"), "-2:37");
        assert_eq!(remaining_label("-2:37"), "-2:37");
        assert_eq!(remaining_label(" -0:05 "), "-0:05");
    }

    #[test]
    fn renders_track_and_lyrics_slots() {
        let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
        let mut player = MiniPlayer::new(true);
        player.open = true;
        player.track = TrackState {
            title: "Midnight Corniche".into(),
            artist: "Nour Haddad".into(),
            current_time: "1:23".into(),
            duration: "3:34".into(),
            ..TrackState::default()
        };
        player.set_lyrics_open(true);
        let lyrics = LyricsState {
            lines: vec!["Lights along the water".into(), "Every window humming low".into()],
            current_line_index: Some(0),
            current_line_text: Some("Lights along the water".into()),
            is_available: true,
        };
        player.lyrics.apply(Some(&lyrics), Instant::now());
        draw(&mut terminal, &player, &PlayerStyles::default(), &config()).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Midnight Corniche"));
        assert!(text.contains("Nour Haddad"));
        assert!(text.contains("1:23 / 3:34"));
        assert!(text.contains("Lights along the water"));
        assert!(text.contains("Every window humming low"));
        assert!(text.contains("offline"));
    }

    #[test]
    fn renders_closed_and_too_small_states() {
        let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
        let mut player = MiniPlayer::new(false);
        player.flash("mirror context lost - restart required", Instant::now());
        draw(&mut terminal, &player, &PlayerStyles::default(), &config()).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Mini-player closed"));
        assert!(text.contains("restart required"));

        let mut tiny = Terminal::new(TestBackend::new(20, 4)).unwrap();
        draw(&mut tiny, &player, &PlayerStyles::default(), &config()).unwrap();
        assert!(screen_text(&tiny).contains("small"));
    }

    #[test]
    fn missing_lyrics_show_fallback() {
        let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
        let mut player = MiniPlayer::new(true);
        player.open = true;
        player.set_lyrics_open(true);
        player.lyrics.apply(None, Instant::now());
        draw(&mut terminal, &player, &PlayerStyles::default(), &config()).unwrap();
        assert!(screen_text(&terminal).contains("No lyrics available"));
    }
}
