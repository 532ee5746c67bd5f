//! `watch` — a terminal dashboard fed by the hub's viewer stream.
//!
//! Every event redraws the whole table. On any transport failure the local
//! replica is discarded and the stream reopened with exponential backoff;
//! nothing is shown again until a fresh snapshot arrives.

use std::io::{IsTerminal, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use tridance_core::replica::{Replica, ViewerPhase};
use tridance_core::HubEvent;

/// Characters of the peer id shown in the table.
const ID_PREFIX_LEN: usize = 8;
const PLACEHOLDER: &str = "--";
/// Magnitudes strictly above this are flagged.
const HIGH_THRESHOLD: f32 = 2.0;

// ── Formatting ────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub high: bool,
}

pub fn format_axis(value: Option<f32>) -> Cell {
    match value {
        Some(v) => Cell {
            text: format!("{:+.2}", v),
            high: v.abs() > HIGH_THRESHOLD,
        },
        None => Cell {
            text: PLACEHOLDER.to_string(),
            high: false,
        },
    }
}

pub fn short_id(peer_id: &str) -> &str {
    match peer_id.char_indices().nth(ID_PREFIX_LEN) {
        Some((end, _)) => &peer_id[..end],
        None => peer_id,
    }
}

fn render_cell(cell: &Cell, color: bool) -> String {
    let padded = format!("{:>7}", cell.text);
    match (cell.high, color) {
        (true, true) => format!("\x1b[1;31m{}\x1b[0m ", padded),
        (true, false) => format!("{}*", padded),
        (false, _) => format!("{} ", padded),
    }
}

/// The whole table, one row per peer ordered by id.
pub fn render(replica: &Replica, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<8}  {:<16} {:>8}  {:>7} {:>7} {:>7} {:>7} {:>7} {:>7}\n",
        "PEER", "LABEL", "COUNT", "ax", "ay", "az", "gx", "gy", "gz"
    ));
    if replica.is_empty() {
        out.push_str("  waiting for phones…\n");
        return out;
    }
    for entry in replica.entries() {
        let r = &entry.record;
        let count = match entry.phase {
            ViewerPhase::Announced => PLACEHOLDER.to_string(),
            ViewerPhase::Active => r.count.to_string(),
        };
        out.push_str(&format!(
            "{:<8}  {:<16} {:>8} ",
            short_id(&r.peer_id),
            r.label.as_deref().unwrap_or(PLACEHOLDER),
            count
        ));
        for value in r.axes().to_array() {
            out.push_str(&render_cell(&format_axis(value), color));
        }
        out.push('\n');
    }
    out
}

// ── Reconnect policy ──────────────────────────────────────────────────────────

const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(8);
const MAX_ATTEMPTS: u32 = 8;

#[derive(Debug)]
pub struct Backoff {
    attempts: u32,
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 0,
            delay: BACKOFF_INITIAL,
        }
    }
}

impl Backoff {
    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= MAX_ATTEMPTS {
            return None;
        }
        let delay = self.delay;
        self.attempts += 1;
        self.delay = (self.delay * 2).min(BACKOFF_MAX);
        Some(delay)
    }

    /// Called once a stream delivers its snapshot.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ── Stream ────────────────────────────────────────────────────────────────────

pub async fn cmd_watch(url: &str) -> Result<()> {
    let mut replica = Replica::new();
    let mut backoff = Backoff::default();
    let color = std::io::stdout().is_terminal();

    loop {
        tokio::select! {
            result = watch_once(url, &mut replica, &mut backoff, color) => match result {
                Ok(()) => eprintln!("hub closed the viewer stream"),
                Err(e) => eprintln!("viewer stream failed: {:#}", e),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        replica.clear();
        let delay = backoff
            .next_delay()
            .with_context(|| format!("giving up on {} after {} attempts", url, MAX_ATTEMPTS))?;
        eprintln!("reconnecting in {} ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}

/// One connection's lifetime: wait for a snapshot, then apply events until
/// the stream ends.
async fn watch_once(
    url: &str,
    replica: &mut Replica,
    backoff: &mut Backoff,
    color: bool,
) -> Result<()> {
    let (mut ws, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {}", url))?;
    let mut synced = false;

    while let Some(frame) = ws.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let event: HubEvent = match serde_json::from_str(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                eprintln!("ignoring malformed event: {}", e);
                continue;
            }
        };

        if !synced {
            if !matches!(event, HubEvent::Snapshot { .. }) {
                // Deltas mean nothing without a base; ask for one.
                ws.send(Message::Text(r#"{"kind":"resync"}"#.into())).await?;
                continue;
            }
            synced = true;
            backoff.reset();
        }

        if replica.apply(event) {
            redraw(replica, color);
        }
    }
    Ok(())
}

fn redraw(replica: &Replica, color: bool) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", render(replica, color));
    let _ = stdout.flush();
}
