use crate::app::App;
use crate::event::PlayerEvent;
use crate::protocol::{self, Request, RequestClient, Response};
use serde::Serialize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// Stream push events and serve requests as JSON lines (for scripting).
///
/// Events are written while the mini-player is open; every stdin line is
/// answered with one response line. Runs until Ctrl-C.
pub async fn display_pipe(app: &App) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut events = app.bus().subscribe();
    let mut visible = app.visibility();
    let client = app.client();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut out = std::io::stdout();

    let opened = serve(&client, Request::ToggleMiniPlayer { preferred_mode: None }).await;
    write_line(&mut out, &opened)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = visible.changed() => {
                if changed.is_err() {
                    break;
                }
                // A freshly opened sink starts from the last full snapshot.
                if *visible.borrow_and_update()
                    && let Some(track) = app.bus().latest_track()
                {
                    write_line(&mut out, &PlayerEvent::TrackUpdated(track))?;
                }
            }

            event = events.recv() => match event {
                Ok(event) => {
                    if *visible.borrow() {
                        write_line(&mut out, &event)?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Pipe fell behind"),
                Err(RecvError::Closed) => break,
            },

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let response = match protocol::decode(&line) {
                        Ok(request) => serve(&client, request).await,
                        Err(response) => response,
                    };
                    write_line(&mut out, &response)?;
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "Stdin closed");
                    stdin_open = false;
                }
            },
        }
    }
    Ok(())
}

async fn serve(client: &RequestClient, request: Request) -> Response {
    client.send(request).await.unwrap_or_else(|e| Response::fail(e.to_string()))
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TrackState;

    #[test]
    fn lines_are_tagged_json() {
        let mut buf = Vec::new();
        write_line(&mut buf, &PlayerEvent::PlayStateUpdated { is_playing: true }).unwrap();
        write_line(&mut buf, &Response::fail("Scraper not ready")).unwrap();
        write_line(&mut buf, &PlayerEvent::TrackUpdated(TrackState::default())).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines[0], serde_json::json!({ "event": "playStateUpdated", "data": { "isPlaying": true } }));
        assert_eq!(lines[1], serde_json::json!({ "success": false, "error": "Scraper not ready" }));
        assert_eq!(lines[2]["event"], "trackUpdated");
        assert_eq!(lines[2]["data"]["title"], "No track playing");
    }
}
