//! Terminal styling for status output.
//!
//! Status goes to stderr, so styling follows whether stderr is a terminal.
//! Chunk paths and JSON on stdout are never styled.

use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};

pub fn is_stderr_interactive() -> bool {
    std::io::stderr().is_terminal()
}

/// Apply `style` when stderr is interactive, otherwise return `msg` as is.
fn styled<F>(msg: &str, style: F) -> String
where
    F: FnOnce(&str) -> String,
{
    if is_stderr_interactive() {
        style(msg)
    } else {
        msg.to_string()
    }
}

/// `error: <msg>` with a red label.
pub fn error(msg: &str) -> String {
    let label = styled("error:", |l| l.red().bold().to_string());
    format!("{} {}", label, msg)
}

/// `warning: <msg>` with a yellow label.
pub fn warning(msg: &str) -> String {
    let label = styled("warning:", |l| l.yellow().bold().to_string());
    format!("{} {}", label, msg)
}

pub fn success(msg: &str) -> String {
    styled(msg, |m| m.green().to_string())
}

pub fn info(msg: &str) -> String {
    styled(msg, |m| m.cyan().to_string())
}

pub fn dim(msg: &str) -> String {
    styled(msg, |m| m.dimmed().to_string())
}

pub fn bold(msg: &str) -> String {
    styled(msg, |m| m.bold().to_string())
}

/// The red "Recording" indicator.
pub fn recording(msg: &str) -> String {
    styled(msg, |m| m.red().bold().to_string())
}

pub fn path(msg: &str) -> String {
    styled(msg, |m| m.underline().to_string())
}

/// A key the operator can press.
pub fn key(msg: &str) -> String {
    styled(msg, |m| m.bold().yellow().to_string())
}

/// Write a status line to stderr.
///
/// The terminal may be in raw mode, where a bare newline does not return the
/// cursor, so interactive lines end in `\r\n`.
pub fn status_line(msg: &str) {
    let mut stderr = std::io::stderr().lock();
    let ending = if stderr.is_terminal() { "\r\n" } else { "\n" };
    let _ = write!(stderr, "{}{}", msg, ending);
    let _ = stderr.flush();
}
