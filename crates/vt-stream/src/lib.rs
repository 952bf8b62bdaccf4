//! Drives a [`vt_line::Terminal`] and a [`vt_emit::EmitStrategy`] from a
//! stream of input chunks, and multiplexes the resulting reconstructed
//! lines across whichever output surfaces the host has wired up: a push
//! callback, a `line` event channel, a pushed stream (trailing `\n`
//! appended), and a bounded polling buffer.
//!
//! This is the only crate in the workspace that touches an async runtime
//! or does logging — the tokenizer, CSI classifier, SGR composer, and cell
//! model underneath are pure, synchronous, side-effect-free state machines.
//! `vt-stream` is also the only crate with a public error type, since it's
//! the only place a host-visible failure (backlog overflow) can occur.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::mpsc;

use vt_emit::EmitStrategy;
use vt_line::Terminal;

/// Bound on the polling buffer's backlog. Overflow drops the oldest line
/// and is reported through [`AdapterError::BacklogOverflow`].
pub const MAX_PENDING: usize = 1000;

/// Errors the adapter can surface to its host. Malformed ANSI input is
/// never one of these — it's silently dropped at the tokenizer/terminal
/// layer.
#[derive(Debug)]
pub enum AdapterError {
    /// The polling buffer exceeded [`MAX_PENDING`]; the oldest queued line
    /// was dropped to make room for the new one.
    BacklogOverflow,
    /// The host's downstream channel or process reported an error during
    /// flush or dispose.
    Host(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::BacklogOverflow => {
                write!(f, "pending-lines backlog exceeded {MAX_PENDING}, oldest line dropped")
            }
            AdapterError::Host(msg) => write!(f, "host error: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Drives the terminal and emission strategy end to end and exposes the
/// four output surfaces: push callback, event channel, pushed stream, and
/// polling buffer.
pub struct Adapter {
    terminal: Terminal,
    strategy: Box<dyn EmitStrategy>,
    newline_lines: Rc<RefCell<VecDeque<String>>>,
    push_callback: Option<Box<dyn FnMut(String)>>,
    event_tx: Option<mpsc::UnboundedSender<String>>,
    stream_tx: Option<mpsc::UnboundedSender<String>>,
    pending: VecDeque<String>,
    flush_tx: mpsc::UnboundedSender<()>,
    flush_rx: mpsc::UnboundedReceiver<()>,
}

impl Adapter {
    /// Build an adapter driving `strategy` over a fresh terminal.
    #[must_use]
    pub fn new(mut strategy: Box<dyn EmitStrategy>) -> Self {
        let newline_lines: Rc<RefCell<VecDeque<String>>> = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&newline_lines);

        let mut terminal = Terminal::new();
        terminal.set_line_ready_callback(move |line| sink.borrow_mut().push_back(line));

        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let timer_tx = flush_tx.clone();
        let emit_cb: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            let _ = timer_tx.send(());
        });
        strategy.set_emit_callback(emit_cb);

        Self {
            terminal,
            strategy,
            newline_lines,
            push_callback: None,
            event_tx: None,
            stream_tx: None,
            pending: VecDeque::new(),
            flush_tx,
            flush_rx,
        }
    }

    /// Build an adapter from a [`vt_emit::Strategy`] value.
    #[must_use]
    pub fn with_strategy(strategy: vt_emit::Strategy) -> Self {
        Self::new(strategy.build())
    }

    /// Push-callback output surface. When set, no buffering occurs for the
    /// pushed-stream or polling surfaces.
    pub fn on_line(&mut self, cb: impl FnMut(String) + 'static) {
        self.push_callback = Some(Box::new(cb));
    }

    /// Subscribe to the `line` event, emitted on every flush regardless of
    /// which other surfaces are active.
    pub fn subscribe_events(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    /// Subscribe to the pushed-stream surface (active only while no push
    /// callback is set); each line arrives with a trailing `\n`.
    pub fn subscribe_pushed_stream(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.stream_tx = Some(tx);
        rx
    }

    /// A snapshot copy of the polling buffer.
    #[must_use]
    pub fn get_pending_lines(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }

    /// Take and clear the polling buffer.
    pub fn consume_pending_lines(&mut self) -> Vec<String> {
        self.pending.drain(..).collect()
    }

    /// Discard the polling buffer without returning it.
    pub fn clear_pending_lines(&mut self) {
        self.pending.clear();
    }

    /// Feed one chunk through the terminal and let the strategy decide
    /// whether to flush. Any `\n`-triggered lines are delivered in order,
    /// before this call returns, followed by a strategy-triggered flush of
    /// whatever remains in the current line if `on_write` asked for one.
    ///
    /// Returns the last backlog-overflow error seen while delivering lines
    /// from this chunk, if any; delivery continues regardless (the oldest
    /// line is dropped, not the chunk's processing).
    pub fn feed(&mut self, chunk: &str) -> Result<(), AdapterError> {
        let state = self.terminal.write(chunk);
        let mut result = Ok(());

        while let Some(line) = self.newline_lines.borrow_mut().pop_front() {
            if let Err(e) = self.deliver_line(line) {
                tracing::warn!(error = %e, "backlog overflow delivering newline-flushed line");
                result = Err(e);
            }
        }

        if self.strategy.on_write(&self.terminal, &state) && self.terminal.has_content() {
            tracing::trace!("strategy requested synchronous flush");
            if let Err(e) = self.flush_now() {
                result = Err(e);
            }
        }

        result
    }

    /// Wait for the next strategy-armed timer to fire and flush if the
    /// current line still has content. Intended to run alongside chunk
    /// delivery in the host's event loop (e.g. via `tokio::select!`); see
    /// [`Adapter::run`] for a ready-made loop.
    pub async fn drive_timer_flush(&mut self) -> Result<(), AdapterError> {
        if self.flush_rx.recv().await.is_none() {
            return Ok(());
        }
        if self.terminal.has_content() {
            tracing::trace!("timer fired, flushing current line");
            self.flush_now()
        } else {
            Ok(())
        }
    }

    /// Call on stream end: ask the strategy for a final flush, dispose the
    /// strategy and terminal regardless of the outcome.
    pub fn end_of_stream(&mut self) -> Result<(), AdapterError> {
        let should_flush = self.strategy.flush();
        let result = if should_flush && self.terminal.has_content() {
            tracing::debug!("stream ended, flushing final line");
            self.flush_now()
        } else {
            Ok(())
        };
        self.dispose();
        result
    }

    /// Drive `input` to completion: feed every chunk, race it against
    /// timer-triggered flushes, and run end-of-stream handling once the
    /// channel closes.
    pub async fn run(&mut self, mut input: mpsc::UnboundedReceiver<String>) -> Result<(), AdapterError> {
        loop {
            tokio::select! {
                chunk = input.recv() => {
                    match chunk {
                        Some(c) => self.feed(&c)?,
                        None => break,
                    }
                }
                signal = self.flush_rx.recv() => {
                    if signal.is_some() && self.terminal.has_content() {
                        tracing::trace!("timer fired, flushing current line");
                        self.flush_now()?;
                    }
                }
            }
        }
        self.end_of_stream()
    }

    /// Cancel timers, drop callbacks, and clear all terminal and strategy
    /// state. Output surfaces already subscribed keep their channel ends
    /// (the sender side is simply dropped, closing them).
    pub fn dispose(&mut self) {
        tracing::debug!("disposing adapter");
        self.strategy.dispose();
        self.terminal.dispose();
        self.push_callback = None;
        self.event_tx = None;
        self.stream_tx = None;
    }

    fn flush_now(&mut self) -> Result<(), AdapterError> {
        let line = self.terminal.render_line();
        self.terminal.reset();
        self.deliver_line(line)
    }

    fn deliver_line(&mut self, line: String) -> Result<(), AdapterError> {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(line.clone());
        }

        if let Some(cb) = self.push_callback.as_mut() {
            cb(line);
            return Ok(());
        }

        if let Some(tx) = &self.stream_tx {
            let mut with_newline = line.clone();
            with_newline.push('\n');
            let _ = tx.send(with_newline);
        }

        let mut result = Ok(());
        if self.pending.len() >= MAX_PENDING {
            self.pending.pop_front();
            result = Err(AdapterError::BacklogOverflow);
        }
        self.pending.push_back(line);
        result
    }
}
