//! Operator key input.
//!
//! Keys are read from the terminal in raw mode so they arrive without a line
//! terminator. Raw mode is process-wide state; [`RawModeGuard`] scopes it to
//! one evaluation and restores the previous mode when dropped, on every exit
//! path.

use crate::keys::KeyPress;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::io::IsTerminal;
use tracing::{debug, warn};

/// Raw terminal mode held for the lifetime of the guard.
#[derive(Debug)]
pub struct RawModeGuard {
    restore: bool,
}

impl RawModeGuard {
    /// Switch the terminal to raw mode.
    ///
    /// If raw mode is already on, the guard leaves it on when dropped.
    pub fn acquire() -> std::io::Result<Self> {
        if terminal::is_raw_mode_enabled()? {
            return Ok(Self { restore: false });
        }
        terminal::enable_raw_mode()?;
        debug!("Raw terminal mode enabled");
        Ok(Self { restore: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if !self.restore {
            return;
        }
        match terminal::disable_raw_mode() {
            Ok(()) => debug!("Raw terminal mode restored"),
            Err(e) => warn!("Failed to restore terminal mode: {}", e),
        }
    }
}

/// Key presses for one evaluation.
///
/// Once the underlying stream ends the key stream reports itself closed and
/// is never polled again.
pub struct KeyStream {
    events: BoxStream<'static, KeyPress>,
    open: bool,
    // Dropped after `events`
    raw_mode: Option<RawModeGuard>,
}

impl KeyStream {
    /// A stream that never yields.
    pub fn silent() -> Self {
        Self::from_stream(stream::pending())
    }

    /// Wrap any key stream.
    pub fn from_stream<S>(events: S) -> Self
    where
        S: Stream<Item = KeyPress> + Send + 'static,
    {
        Self {
            events: events.boxed(),
            open: true,
            raw_mode: None,
        }
    }

    /// Next key press, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<KeyPress> {
        if !self.open {
            return None;
        }
        let key = self.events.next().await;
        if key.is_none() {
            self.open = false;
        }
        key
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl std::fmt::Debug for KeyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStream")
            .field("open", &self.open)
            .field("raw_mode", &self.raw_mode.is_some())
            .finish()
    }
}

/// Source of key streams, opened once per evaluation.
pub trait KeyInput: Send {
    fn open(&mut self) -> KeyStream;
}

impl<T: KeyInput + ?Sized> KeyInput for &mut T {
    fn open(&mut self) -> KeyStream {
        (**self).open()
    }
}

/// No key controls. Runs end on deadlines, size, or interrupt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl KeyInput for NoKeys {
    fn open(&mut self) -> KeyStream {
        KeyStream::silent()
    }
}

/// Keys from the controlling terminal.
///
/// Without an interactive terminal every stream is silent; the warning is
/// logged once.
#[derive(Debug, Default)]
pub struct TerminalKeys {
    warned: bool,
}

impl TerminalKeys {
    pub fn new() -> Self {
        Self::default()
    }

    fn degrade(&mut self, reason: &str) -> KeyStream {
        if !self.warned {
            warn!("Key controls disabled: {}", reason);
            self.warned = true;
        }
        KeyStream::silent()
    }
}

impl KeyInput for TerminalKeys {
    fn open(&mut self) -> KeyStream {
        if !std::io::stdin().is_terminal() {
            return self.degrade("stdin is not a terminal");
        }

        let guard = match RawModeGuard::acquire() {
            Ok(guard) => guard,
            Err(e) => return self.degrade(&format!("cannot enter raw mode: {}", e)),
        };

        let events = EventStream::new()
            .take_while(|event| {
                if let Err(e) = event {
                    warn!("Terminal input failed: {}", e);
                }
                future::ready(event.is_ok())
            })
            .filter_map(|event| future::ready(event.ok().as_ref().and_then(translate)));

        KeyStream {
            events: events.boxed(),
            open: true,
            raw_mode: Some(guard),
        }
    }
}

/// Map a terminal event to a key press.
///
/// Raw mode turns Ctrl+C into an ordinary key event, so it is reported as
/// [`KeyPress::Interrupt`].
fn translate(event: &Event) -> Option<KeyPress> {
    let Event::Key(key) = event else {
        return None;
    };
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyPress::Interrupt)
        }
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            Some(KeyPress::Char(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventState};

    fn key(code: KeyCode, modifiers: KeyModifiers, kind: KeyEventKind) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn test_translate_plain_and_shifted_chars() {
        let plain = key(KeyCode::Char('s'), KeyModifiers::NONE, KeyEventKind::Press);
        assert_eq!(translate(&plain), Some(KeyPress::Char('s')));

        let shifted = key(KeyCode::Char('S'), KeyModifiers::SHIFT, KeyEventKind::Press);
        assert_eq!(translate(&shifted), Some(KeyPress::Char('S')));
    }

    #[test]
    fn test_translate_ctrl_c_is_interrupt() {
        let ctrl_c = key(KeyCode::Char('c'), KeyModifiers::CONTROL, KeyEventKind::Press);
        assert_eq!(translate(&ctrl_c), Some(KeyPress::Interrupt));
    }

    #[test]
    fn test_translate_ignores_other_events() {
        let release = key(KeyCode::Char('s'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(translate(&release), None);

        let alt = key(KeyCode::Char('s'), KeyModifiers::ALT, KeyEventKind::Press);
        assert_eq!(translate(&alt), None);

        let enter = key(KeyCode::Enter, KeyModifiers::NONE, KeyEventKind::Press);
        assert_eq!(translate(&enter), None);

        assert_eq!(translate(&Event::FocusGained), None);
    }

    #[tokio::test]
    async fn test_key_stream_closes_when_source_ends() {
        let mut keys = KeyStream::from_stream(stream::iter(vec![KeyPress::Char('a')]));
        assert!(keys.is_open());
        assert_eq!(keys.next().await, Some(KeyPress::Char('a')));
        assert_eq!(keys.next().await, None);
        assert!(!keys.is_open());
        assert_eq!(keys.next().await, None);
    }

    #[tokio::test]
    async fn test_no_keys_stays_open() {
        let mut input = NoKeys;
        let mut keys = input.open();
        assert!(keys.is_open());
        let polled = tokio::time::timeout(std::time::Duration::from_millis(10), keys.next()).await;
        assert!(polled.is_err());
        assert!(keys.is_open());
    }
}
