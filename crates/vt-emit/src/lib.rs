//! Emission strategies: pluggable decision engines that look at each
//! write's [`TerminalState`] and decide whether a line should flush right
//! now, or after a scheduled delay.
//!
//! [`EmitStrategy`] is a trait rather than a tagged enum so a host can
//! supply its own strategy alongside the three built-in ones. All three
//! here are single-threaded in spirit: a pending timer is always
//! cancelled before a new one is armed, and at most one flush is ever
//! requested per logical line.

use std::sync::Arc;

use tokio::task::JoinHandle;
use vt_line::{Terminal, TerminalState};

/// Default delay for [`FixedTimeout`], in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 100;
/// Default delay for a volatile line under [`StatefulTimeout`].
pub const DEFAULT_VOLATILE_MS: u64 = 50;
/// Default delay for a stable line under [`StatefulTimeout`].
pub const DEFAULT_STABLE_MS: u64 = 200;

/// A callback a strategy invokes later, from its own timer task, to ask the
/// host to flush the current line. Cheap to clone so it can be moved into a
/// spawned task on every arm.
pub type EmitCallback = Arc<dyn Fn() + Send + Sync>;

/// Decides when a streaming terminal's current line should be flushed.
///
/// `on_write` is called synchronously right after every [`Terminal::write`]
/// with that same call's resulting state; a `true` return means "flush
/// now, before the next write". A strategy may additionally arm a timer
/// that invokes the emit callback asynchronously later; the host must not
/// re-enter the terminal's `write` from inside that callback.
pub trait EmitStrategy: Send {
    /// Store the callback a later timer fire should invoke.
    fn set_emit_callback(&mut self, cb: EmitCallback);

    /// Decide whether to flush synchronously after this write.
    fn on_write(&mut self, terminal: &Terminal, state: &TerminalState) -> bool;

    /// Called on stream end. Cancels any pending timer and reports whether
    /// a final flush should happen.
    fn flush(&mut self) -> bool;

    /// Cancel timers and drop the callback. The strategy is not reused
    /// afterwards.
    fn dispose(&mut self);
}

/// Never schedules timers. Lines are expected to flush via the terminal's
/// own line-ready callback on `\n`; `on_write` always defers to that path.
#[derive(Debug, Default)]
pub struct Immediate;

impl EmitStrategy for Immediate {
    fn set_emit_callback(&mut self, _cb: EmitCallback) {}

    fn on_write(&mut self, _terminal: &Terminal, _state: &TerminalState) -> bool {
        false
    }

    fn flush(&mut self) -> bool {
        true
    }

    fn dispose(&mut self) {}
}

/// Flushes immediately on `\n`; otherwise arms a single fixed-delay timer
/// per write, cancelling any timer still pending from an earlier write.
pub struct FixedTimeout {
    timeout_ms: u64,
    callback: Option<EmitCallback>,
    timer: Option<JoinHandle<()>>,
}

impl FixedTimeout {
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            callback: None,
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    fn arm(&mut self, delay_ms: u64) {
        self.cancel_timer();
        let Some(cb) = self.callback.clone() else {
            return;
        };
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            cb();
        }));
    }
}

impl Default for FixedTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl EmitStrategy for FixedTimeout {
    fn set_emit_callback(&mut self, cb: EmitCallback) {
        self.callback = Some(cb);
    }

    fn on_write(&mut self, terminal: &Terminal, state: &TerminalState) -> bool {
        self.cancel_timer();
        if state.had_newline {
            return true;
        }
        if terminal.has_content() {
            self.arm(self.timeout_ms);
        }
        false
    }

    fn flush(&mut self) -> bool {
        self.cancel_timer();
        true
    }

    fn dispose(&mut self) {
        self.cancel_timer();
        self.callback = None;
    }
}

/// As [`FixedTimeout`], but the armed delay depends on whether the write
/// that triggered it looked *volatile* (carriage-return overwrite, cursor
/// motion, or erasure — a progress-bar-like line) or *stable* (plain text).
/// Volatile lines get a short timeout so transient states aren't emitted;
/// stable lines get a longer one that coalesces late arrivals.
pub struct StatefulTimeout {
    volatile_ms: u64,
    stable_ms: u64,
    callback: Option<EmitCallback>,
    timer: Option<JoinHandle<()>>,
}

impl StatefulTimeout {
    #[must_use]
    pub fn new(volatile_ms: u64, stable_ms: u64) -> Self {
        Self {
            volatile_ms,
            stable_ms,
            callback: None,
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    fn arm(&mut self, delay_ms: u64) {
        self.cancel_timer();
        let Some(cb) = self.callback.clone() else {
            return;
        };
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            cb();
        }));
    }
}

impl Default for StatefulTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_VOLATILE_MS, DEFAULT_STABLE_MS)
    }
}

impl EmitStrategy for StatefulTimeout {
    fn set_emit_callback(&mut self, cb: EmitCallback) {
        self.callback = Some(cb);
    }

    fn on_write(&mut self, terminal: &Terminal, state: &TerminalState) -> bool {
        self.cancel_timer();
        if state.had_newline {
            return true;
        }
        if terminal.has_content() {
            let delay = if state.is_volatile() {
                self.volatile_ms
            } else {
                self.stable_ms
            };
            self.arm(delay);
        }
        false
    }

    fn flush(&mut self) -> bool {
        self.cancel_timer();
        true
    }

    fn dispose(&mut self) {
        self.cancel_timer();
        self.callback = None;
    }
}

/// The three built-in strategies plus their configuration, for hosts that
/// want to select one by value (e.g. from a config file) instead of
/// constructing a `Box<dyn EmitStrategy>` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Immediate,
    FixedTimeout { timeout_ms: u64 },
    StatefulTimeout { volatile_ms: u64, stable_ms: u64 },
}

impl Default for Strategy {
    fn default() -> Self {
        Self::StatefulTimeout {
            volatile_ms: DEFAULT_VOLATILE_MS,
            stable_ms: DEFAULT_STABLE_MS,
        }
    }
}

impl Strategy {
    /// Build the corresponding boxed [`EmitStrategy`].
    #[must_use]
    pub fn build(self) -> Box<dyn EmitStrategy> {
        match self {
            Strategy::Immediate => Box::new(Immediate),
            Strategy::FixedTimeout { timeout_ms } => Box::new(FixedTimeout::new(timeout_ms)),
            Strategy::StatefulTimeout {
                volatile_ms,
                stable_ms,
            } => Box::new(StatefulTimeout::new(volatile_ms, stable_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vt_line::Terminal;

    fn state(had_newline: bool, had_carriage_return: bool) -> TerminalState {
        TerminalState {
            had_newline,
            had_carriage_return,
            had_cursor_movement: false,
            had_erasure: false,
            cursor_position: 0,
            cell_count: 1,
        }
    }

    #[test]
    fn immediate_never_flushes_synchronously() {
        let mut s = Immediate;
        let t = Terminal::new();
        assert!(!s.on_write(&t, &state(true, false)));
        assert!(!s.on_write(&t, &state(false, false)));
        assert!(s.flush());
    }

    #[tokio::test]
    async fn fixed_timeout_flushes_immediately_on_newline() {
        let mut s = FixedTimeout::new(100);
        let mut t = Terminal::new();
        t.write("hi");
        assert!(s.on_write(&t, &state(true, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_timeout_fires_after_delay() {
        let mut s = FixedTimeout::new(100);
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        s.set_emit_callback(Arc::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        let mut t = Terminal::new();
        t.write("hi");
        assert!(!s.on_write(&t, &state(false, false)));

        tokio::time::advance(std::time::Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_write_cancels_prior_timer() {
        let mut s = FixedTimeout::new(100);
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        s.set_emit_callback(Arc::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        let mut t = Terminal::new();
        t.write("hi");
        s.on_write(&t, &state(false, false));
        // A second write before the timer fires cancels and re-arms it.
        t.write(" there");
        s.on_write(&t, &state(false, false));

        tokio::time::advance(std::time::Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stateful_timeout_uses_volatile_delay_for_carriage_return() {
        let mut s = StatefulTimeout::new(50, 200);
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        s.set_emit_callback(Arc::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        let mut t = Terminal::new();
        t.write("progress\r");
        s.on_write(&t, &state(false, true));

        tokio::time::advance(std::time::Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stateful_timeout_uses_stable_delay_for_plain_text() {
        let mut s = StatefulTimeout::new(50, 200);
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        s.set_emit_callback(Arc::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        let mut t = Terminal::new();
        t.write("plain text");
        s.on_write(&t, &state(false, false));

        tokio::time::advance(std::time::Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0, "stable line should not have fired yet");

        tokio::time::advance(std::time::Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_pending_timer() {
        let mut s = FixedTimeout::new(100);
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        s.set_emit_callback(Arc::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        let mut t = Terminal::new();
        t.write("hi");
        s.on_write(&t, &state(false, false));
        s.dispose();

        tokio::time::advance(std::time::Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strategy_default_is_stateful_timeout() {
        assert_eq!(
            Strategy::default(),
            Strategy::StatefulTimeout {
                volatile_ms: DEFAULT_VOLATILE_MS,
                stable_ms: DEFAULT_STABLE_MS,
            }
        );
    }
}
