//! A single horizontal line of terminal cells, driven by [`ansi_tokenizer`]
//! tokens and [`csi_classify`] CSI classification, holding styled glyphs
//! under cursor movement, erasure, insertion, deletion, save/restore, and
//! SGR state.
//!
//! There is no vertical axis here: scroll regions, full-screen erase, and
//! cursor-up/-down are deliberately no-ops (see the command table in
//! [`apply_csi`]). This is "one line of a terminal", not a terminal.

use ansi_tokenizer::Token;
use vt_sgr::SgrAttributes;

/// The maximum column a cursor or cell index may reach. Forward cursor
/// motion that would exceed this is clamped rather than allowed to grow
/// the cell vector without bound.
const MAX_COLUMNS: usize = 1_000_000;

/// One column of the line: either erased/never-written, or a glyph carrying
/// the SGR attributes active when it was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Glyph {
        ch: char,
        sgr: SgrAttributes,
    },
}

/// Flags and post-write facts reported from a single [`Terminal::write`]
/// call, consumed by an emission strategy to decide when to flush.
///
/// The boolean flags are the OR of every token processed during that call;
/// they are not sticky across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalState {
    pub had_newline: bool,
    pub had_carriage_return: bool,
    pub had_cursor_movement: bool,
    pub had_erasure: bool,
    pub cursor_position: usize,
    pub cell_count: usize,
}

impl TerminalState {
    /// A line whose construction involved carriage-return overwrite,
    /// intra-line cursor motion, or erasure — its visible state may still
    /// change before the line is logically done (see `vt-emit`).
    #[must_use]
    pub const fn is_volatile(&self) -> bool {
        self.had_carriage_return || self.had_cursor_movement || self.had_erasure
    }
}

/// A single logical terminal line: cells, cursor, active/saved SGR state,
/// and the carry-over buffer for ANSI sequences split across chunks.
pub struct Terminal {
    cells: Vec<Cell>,
    cursor: usize,
    active_sgr: SgrAttributes,
    saved_cursor: usize,
    incomplete: String,
    on_line_ready: Option<Box<dyn FnMut(String)>>,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("cells", &self.cells)
            .field("cursor", &self.cursor)
            .field("active_sgr", &self.active_sgr)
            .field("saved_cursor", &self.saved_cursor)
            .field("incomplete", &self.incomplete)
            .finish_non_exhaustive()
    }
}

impl Terminal {
    /// An empty terminal: no cells, cursor at 0, no active or saved SGR.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            cursor: 0,
            active_sgr: SgrAttributes::default(),
            saved_cursor: 0,
            incomplete: String::new(),
            on_line_ready: None,
        }
    }

    /// Register a callback invoked synchronously, inside [`Terminal::write`],
    /// the moment a `\n` control token is processed. The terminal renders
    /// and resets itself before invoking the callback, so several `\n` in a
    /// single chunk are each delivered as their own completed line, in
    /// order. The callback must not call back into this terminal's `write`;
    /// doing so is undefined behavior (there is no reentrancy guard).
    pub fn set_line_ready_callback(&mut self, cb: impl FnMut(String) + 'static) {
        self.on_line_ready = Some(Box::new(cb));
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Clear cells and cursor; `active_sgr` and `saved_cursor` survive (SGR
    /// state and the save-point both carry across lines).
    pub fn reset(&mut self) {
        self.cells.clear();
        self.cursor = 0;
    }

    /// Clear everything, including the incomplete-sequence buffer and the
    /// active SGR. The terminal is not usable afterwards except via a fresh
    /// `write`, at which point it behaves like a brand-new terminal.
    pub fn dispose(&mut self) {
        self.cells.clear();
        self.cursor = 0;
        self.active_sgr = SgrAttributes::default();
        self.incomplete.clear();
        self.on_line_ready = None;
    }

    /// Feed one chunk of decoded text through the tokenizer and apply every
    /// resulting token. Any trailing incomplete ANSI sequence is buffered
    /// and prepended to the next chunk.
    pub fn write(&mut self, chunk: &str) -> TerminalState {
        let mut state = TerminalState::default();

        let mut buf = std::mem::take(&mut self.incomplete);
        buf.push_str(chunk);

        let mut pos = 0;
        while pos < buf.len() {
            match ansi_tokenizer::next_token(&buf, pos) {
                Some((tok, len)) => {
                    self.apply(tok, &mut state);
                    pos += len;
                }
                None => {
                    self.incomplete.push_str(&buf[pos..]);
                    break;
                }
            }
        }

        state.cursor_position = self.cursor;
        state.cell_count = self.cells.len();
        state
    }

    fn apply(&mut self, tok: Token<'_>, state: &mut TerminalState) {
        match tok {
            Token::Printable(ch) => self.write_char(ch),
            Token::Control('\r') => {
                self.cursor = 0;
                state.had_carriage_return = true;
            }
            Token::Control('\n') => {
                state.had_newline = true;
                self.flush_line_ready();
            }
            Token::Control('\x08') => {
                self.cursor = self.cursor.saturating_sub(1);
                state.had_cursor_movement = true;
            }
            Token::Control('\t') => self.apply_tab(),
            Token::Csi { params, cmd } => self.apply_csi(params, cmd, state),
            Token::Escape('7') => {
                self.saved_cursor = self.cursor;
                state.had_cursor_movement = true;
            }
            Token::Escape('8') => {
                self.cursor = self.saved_cursor;
                state.had_cursor_movement = true;
            }
            // Other single-char escapes, bare skipped ESC, OSC, and
            // unrecognized control bytes: no effect on the line.
            Token::Control(_) | Token::Escape(_) | Token::Osc(_) | Token::None => {}
        }
    }

    fn write_char(&mut self, ch: char) {
        self.put(self.cursor, Cell::Glyph { ch, sgr: self.active_sgr });
        self.cursor = clamp_col(self.cursor + 1);
    }

    fn apply_tab(&mut self) {
        let next = clamp_col(((self.cursor / 8) + 1) * 8);
        while self.cursor < next {
            self.put(self.cursor, Cell::Glyph { ch: ' ', sgr: self.active_sgr });
            self.cursor += 1;
        }
    }

    fn apply_csi(&mut self, params_str: &str, cmd: char, state: &mut TerminalState) {
        let classified = csi_classify::classify(params_str, cmd);
        let params = classified.params.as_slice();
        if classified.affects.cursor {
            state.had_cursor_movement = true;
        }
        if classified.affects.erasure {
            state.had_erasure = true;
        }

        match cmd {
            'm' => {
                self.active_sgr = vt_sgr::compose(&self.active_sgr, &vt_sgr::parse(params));
            }
            'G' | '`' => {
                self.cursor = clamp_col(or_default(param(params, 0), 1).saturating_sub(1) as usize);
            }
            'C' => {
                self.cursor = clamp_col(self.cursor + or_default(param(params, 0), 1) as usize);
            }
            'D' => {
                let n = or_default(param(params, 0), 1) as usize;
                self.cursor = self.cursor.saturating_sub(n);
            }
            'K' => self.erase_line(or_default(param(params, 0), 0)),
            'X' => {
                let n = or_default(param(params, 0), 1) as usize;
                self.ensure_len(self.cursor.saturating_add(n));
                let end = self.cursor.saturating_add(n).min(self.cells.len());
                if self.cursor < end {
                    for c in &mut self.cells[self.cursor..end] {
                        *c = Cell::Empty;
                    }
                }
            }
            'P' => {
                let n = (or_default(param(params, 0), 1) as usize).min(self.cells.len().saturating_sub(self.cursor));
                let end = self.cursor + n;
                if end <= self.cells.len() {
                    self.cells.drain(self.cursor..end);
                }
            }
            '@' => {
                let at = self.cursor.min(self.cells.len());
                let n = (or_default(param(params, 0), 1) as usize).min(MAX_COLUMNS.saturating_sub(self.cells.len()));
                for _ in 0..n {
                    self.cells.insert(at, Cell::Empty);
                }
            }
            's' => self.saved_cursor = self.cursor,
            'u' => self.cursor = self.saved_cursor,
            // Vertical motion, scroll regions, full-screen erase: this is
            // one line, not a screen. Ignored, not an error.
            _ => {}
        }
    }

    /// `params[0]` defaulted to `0`: mode 0 truncates, 1 blanks the prefix
    /// through the cursor inclusive (cursor is left where it was — see
    /// DESIGN.md for why this isn't "fixed"), 2 clears the whole line.
    fn erase_line(&mut self, mode: i32) {
        match mode {
            0 => self.cells.truncate(self.cursor),
            1 => {
                let end = (self.cursor + 1).min(self.cells.len());
                for c in &mut self.cells[..end] {
                    *c = Cell::Empty;
                }
            }
            2 => {
                self.cells.clear();
                self.cursor = 0;
            }
            _ => {}
        }
    }

    fn put(&mut self, index: usize, cell: Cell) {
        self.ensure_len(index + 1);
        self.cells[index] = cell;
    }

    fn ensure_len(&mut self, len: usize) {
        let len = len.min(MAX_COLUMNS);
        if self.cells.len() < len {
            self.cells.resize(len, Cell::Empty);
        }
    }

    fn flush_line_ready(&mut self) {
        if self.on_line_ready.is_some() {
            let line = self.render_line();
            self.reset();
            if let Some(cb) = self.on_line_ready.as_mut() {
                cb(line);
            }
        }
    }

    /// Render the current line as the minimal ANSI-armored string that
    /// reproduces its glyphs and SGR transitions.
    #[must_use]
    pub fn render_line(&self) -> String {
        let Some(last) = self.cells.iter().rposition(|c| matches!(c, Cell::Glyph { .. })) else {
            return String::new();
        };

        let mut out = String::new();
        let mut last_sgr = SgrAttributes::default();

        for cell in &self.cells[..=last] {
            match cell {
                Cell::Glyph { ch, sgr } => {
                    if *sgr != last_sgr {
                        if sgr.is_empty() {
                            out.push_str("\x1b[0m");
                        } else if !last_sgr.is_empty() {
                            out.push_str("\x1b[0m");
                            out.push_str(&vt_sgr::to_sequence(sgr));
                        } else {
                            out.push_str(&vt_sgr::to_sequence(sgr));
                        }
                        last_sgr = *sgr;
                    }
                    out.push(*ch);
                }
                Cell::Empty => {
                    if !last_sgr.is_empty() {
                        out.push_str("\x1b[0m");
                        last_sgr = SgrAttributes::default();
                    }
                    out.push(' ');
                }
            }
        }

        if !last_sgr.is_empty() {
            out.push_str("\x1b[0m");
        }

        trim_trailing_filler(&out)
    }
}

fn clamp_col(c: usize) -> usize {
    c.min(MAX_COLUMNS)
}

fn param(params: &[i32], idx: usize) -> i32 {
    params.get(idx).copied().unwrap_or(0)
}

fn or_default(v: i32, default: i32) -> i32 {
    if v == 0 { default } else { v }
}

/// Spaces only appear in a rendered line because of erasure, past-end
/// cursor motion, or tab expansion; a trailing run of them (kept alive only
/// because they precede a reset, or because nothing overwrote them) is
/// filler, not content. Inner spaces are left exactly as rendered.
fn trim_trailing_filler(s: &str) -> String {
    if let Some(body) = s.strip_suffix("\x1b[0m") {
        format!("{}\x1b[0m", body.trim_end_matches(' '))
    } else {
        s.trim_end_matches(' ').to_string()
    }
}
