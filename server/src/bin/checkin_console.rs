//! Door-side check-in console.
//!
//! Reads decoded QR payloads from a keyboard-wedge scanner (one per line on
//! stdin), checks each ticket in, and ignores further scans until the
//! operator presses Enter on an empty line.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use eventhub_server::checkin::ScanGate;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check attendees in by scanning their ticket QR codes")]
struct Args {
    /// Base URL of the events API
    #[arg(short, long, env = "EVENTHUB_URL", default_value = "http://localhost:3001")]
    server: String,

    /// Volunteer (or admin) bearer token
    #[arg(short, long, env = "VOLUNTEER_TOKEN", hide_env_values = true)]
    token: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum Verdict {
    Verified { name: String, email: String },
    AlreadyCheckedIn { name: String },
    InvalidTicket,
    Failed(String),
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Verified { name, email } => write!(f, "VERIFIED    {name} <{email}>"),
            Verdict::AlreadyCheckedIn { name } => write!(f, "ALREADY IN  {name} was already checked in"),
            Verdict::InvalidTicket => write!(f, "INVALID     ticket not recognised"),
            Verdict::Failed(reason) => write!(f, "ERROR       {reason}"),
        }
    }
}

fn verdict_from(status: u16, body: &Value) -> Verdict {
    let text = |v: &Value| v.as_str().unwrap_or("unknown").to_string();
    match status {
        200 => Verdict::Verified {
            name: text(&body["data"]["userName"]),
            email: text(&body["data"]["userEmail"]),
        },
        409 => Verdict::AlreadyCheckedIn {
            name: text(&body["error"]["details"]["userName"]),
        },
        404 => Verdict::InvalidTicket,
        401 | 403 => Verdict::Failed("not authorised, check the volunteer token".to_string()),
        other => Verdict::Failed(format!(
            "server answered {other}: {}",
            body["error"]["message"].as_str().unwrap_or("no details")
        )),
    }
}

/// Percent-encodes everything outside the unreserved set so a token is always
/// one path segment.
fn encode_segment(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn verify(agent: &ureq::Agent, args: &Args, token: &str) -> Verdict {
    let url = format!(
        "{}/registrations/checkin/{}",
        args.server.trim_end_matches('/'),
        encode_segment(token)
    );
    debug!(%url, "Dispatching check-in");

    let (status, body) = match agent
        .put(&url)
        .set("Authorization", &format!("Bearer {}", args.token))
        .call()
    {
        Ok(response) => (response.status(), response.into_string()),
        Err(ureq::Error::Status(code, response)) => (code, response.into_string()),
        Err(e) => {
            warn!(error = %e, "Check-in request failed");
            return Verdict::Failed(e.to_string());
        }
    };

    let body = body
        .ok()
        .and_then(|b| serde_json::from_str::<Value>(&b).ok())
        .unwrap_or(Value::Null);
    verdict_from(status, &body)
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(args.timeout))
        .build();
    let mut gate: ScanGate<Verdict> = ScanGate::new();
    let mut out = io::stdout();

    writeln!(out, "Ready to scan ({}).", args.server)?;
    for line in io::stdin().lock().lines() {
        let line = line?;

        if line.trim().is_empty() {
            if gate.acknowledge().is_some() {
                writeln!(out, "Ready for next scan.")?;
            }
            continue;
        }

        let Some(token) = gate.offer(&line) else {
            debug!(ignored = gate.ignored(), "Scan ignored until the current result is acknowledged");
            continue;
        };

        let verdict = verify(&agent, &args, &token);
        writeln!(out, "{verdict}")?;
        writeln!(out, "Press Enter to continue.")?;
        out.flush()?;
        gate.resolve(verdict);
    }

    Ok(())
}
