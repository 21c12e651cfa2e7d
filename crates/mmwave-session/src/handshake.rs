//! Line-oriented configuration handshake on the command port.
//!
//! Every command is written as one line. The sensor echoes it and answers
//! with a status line; either of the two lines read back must be one of
//! [`VALID_REPLIES`] for the command to count as accepted.

use mmwave_transport::{ByteSource, TransportError};
use tracing::{debug, warn};

use crate::config::ConfigLines;

/// Replies that acknowledge a command.
pub const VALID_REPLIES: [&str; 2] = ["Done", "Ignored: Sensor is already stopped"];

/// Stand-in for a reply line that is not valid UTF-8.
const UNDECODABLE_REPLY: &str = "error";

/// Outcome of a successful configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReport {
    /// Attempts made in total, including those before a port swap.
    pub attempts: u32,
    /// Whether the ports had to be exchanged.
    pub swapped: bool,
}

/// Send the script up to `attempts` times (at least once).
///
/// Returns the number of attempts used, or `None` when every one was
/// rejected. Transport failures abort immediately.
pub(crate) fn send_with_retries(
    port: &mut dyn ByteSource,
    lines: &ConfigLines,
    attempts: u32,
) -> Result<Option<u32>, TransportError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if send_script(port, lines)? {
            debug!(port = port.name(), attempt, "configuration accepted");
            return Ok(Some(attempt));
        }
        warn!(port = port.name(), attempt, attempts, "configuration attempt failed");
    }
    Ok(None)
}

/// One pass over the script; stops at the first rejected command.
fn send_script(port: &mut dyn ByteSource, lines: &ConfigLines) -> Result<bool, TransportError> {
    for command in lines.commands() {
        port.write(command.as_bytes())?;
        let first = reply(port)?;
        let second = reply(port)?;

        if !is_valid(&first) && !is_valid(&second) {
            warn!(
                port = port.name(),
                command = command.trim_end(),
                first = %first,
                second = %second,
                "command rejected"
            );
            return Ok(false);
        }
    }
    Ok(true)
}

fn reply(port: &mut dyn ByteSource) -> Result<String, TransportError> {
    let line = port.read_line()?;
    Ok(match std::str::from_utf8(&line) {
        Ok(text) => text.trim().to_string(),
        Err(_) => UNDECODABLE_REPLY.to_string(),
    })
}

fn is_valid(reply: &str) -> bool {
    VALID_REPLIES.contains(&reply)
}
