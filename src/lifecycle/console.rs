//! Interactive operator console.
//!
//! Reads one command per line:
//! - `status`: table of backends with health and CPU%
//! - `exit` / `quit`: graceful shutdown
//! - `help`: list commands

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendTarget, RoutingState};

const HELP: &str = "commands: status, exit, help\n";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Exit,
    Help,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Command::Empty,
            "status" => Command::Status,
            "exit" | "quit" => Command::Exit,
            "help" | "?" => Command::Help,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Render the `status` table for a snapshot.
pub fn render_status(targets: &[BackendTarget]) -> String {
    let name_width = targets
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!("{:<name_width$}  {:<5}  {:<6}  {}\n", "NAME", "PORT", "HEALTH", "CPU%");
    for t in targets {
        let health = if t.healthy { "OK" } else { "DOWN" };
        out.push_str(&format!(
            "{:<name_width$}  {:<5}  {:<6}  {:.2}\n",
            t.name, t.port, health, t.cpu_percent
        ));
    }
    out
}

/// Serve console commands from `input` until `exit`, end of input, or an
/// external shutdown.
///
/// End of input stops the console only; the proxy keeps running.
pub async fn run_console<R, W>(state: Arc<RoutingState>, shutdown: Shutdown, input: R, mut output: W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stopped = shutdown.subscribe();
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = stopped.recv() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("Console input closed");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Console read failed");
                break;
            }
        };

        let reply = match Command::parse(&line) {
            Command::Status => render_status(&state.snapshot()),
            Command::Help => HELP.to_string(),
            Command::Empty => continue,
            Command::Unknown(cmd) => format!("unknown command '{cmd}'\n{HELP}"),
            Command::Exit => {
                tracing::info!("Exit requested from console");
                shutdown.trigger();
                break;
            }
        };

        if let Err(e) = write_reply(&mut output, &reply).await {
            tracing::warn!(error = %e, "Console write failed");
            break;
        }
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &str) -> std::io::Result<()> {
    output.write_all(reply.as_bytes()).await?;
    output.flush().await
}
