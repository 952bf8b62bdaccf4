//! Select Graphic Rendition: parsing a CSI `m` parameter list into an
//! attribute record, merging records under overlay, and emitting the
//! minimal ANSI sequence that reproduces a target attribute set.
//!
//! "Unset" and "explicitly false" are distinct states for every boolean
//! attribute: unset means inherit, false means turned off via `22`/`23`/...
//! `Option<bool>` models that directly. Colors never carry a bit-24 marker
//! (the naive packed-integer encoding the wire format suggests collides
//! with black RGB); a tagged [`Color`] enum keeps the in-memory
//! representation unambiguous while still emitting the narrowest wire form.

use std::fmt;

/// A resolved foreground/background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// `0..=255`: standard (0-7), bright (8-15), or 256-color palette.
    Palette(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// A single line's active style. Every field is independently unset
/// (`None`), explicitly cleared (`Some(false)`), or set (`Some(true)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SgrAttributes {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: Option<bool>,
    pub dim: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub blink: Option<bool>,
    pub inverse: Option<bool>,
    pub hidden: Option<bool>,
    pub strikethrough: Option<bool>,
}

impl SgrAttributes {
    /// True when no field carries a value at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fg.is_none()
            && self.bg.is_none()
            && self.bold.is_none()
            && self.dim.is_none()
            && self.italic.is_none()
            && self.underline.is_none()
            && self.blink.is_none()
            && self.inverse.is_none()
            && self.hidden.is_none()
            && self.strikethrough.is_none()
    }
}

/// Parse a CSI `m` parameter list (already split into integers by
/// `csi-classify`) into an attribute record.
///
/// `0` anywhere in the list discards everything parsed before or after it
/// and returns an empty record immediately.
#[must_use]
pub fn parse(params: &[i32]) -> SgrAttributes {
    let mut attrs = SgrAttributes::default();
    let mut i = 0;
    while i < params.len() {
        match params[i] {
            0 => return SgrAttributes::default(),
            1 => attrs.bold = Some(true),
            2 => attrs.dim = Some(true),
            3 => attrs.italic = Some(true),
            4 => attrs.underline = Some(true),
            5 => attrs.blink = Some(true),
            7 => attrs.inverse = Some(true),
            8 => attrs.hidden = Some(true),
            9 => attrs.strikethrough = Some(true),
            22 => {
                attrs.bold = Some(false);
                attrs.dim = Some(false);
            }
            23 => attrs.italic = Some(false),
            24 => attrs.underline = Some(false),
            25 => attrs.blink = Some(false),
            27 => attrs.inverse = Some(false),
            28 => attrs.hidden = Some(false),
            29 => attrs.strikethrough = Some(false),
            p @ 30..=37 => attrs.fg = Some(Color::Palette((p - 30) as u8)),
            38 => {
                if let Some(advance) = parse_extended_color(params, i, &mut attrs.fg) {
                    i += advance;
                }
            }
            39 => attrs.fg = None,
            p @ 40..=47 => attrs.bg = Some(Color::Palette((p - 40) as u8)),
            48 => {
                if let Some(advance) = parse_extended_color(params, i, &mut attrs.bg) {
                    i += advance;
                }
            }
            49 => attrs.bg = None,
            p @ 90..=97 => attrs.fg = Some(Color::Palette((p - 90 + 8) as u8)),
            p @ 100..=107 => attrs.bg = Some(Color::Palette((p - 100 + 8) as u8)),
            _ => {}
        }
        i += 1;
    }
    attrs
}

/// Parses `5;n` or `2;r;g;b` following a `38`/`48` at `params[i]`.
///
/// Returns how many extra elements (beyond the usual single-param step)
/// were consumed, or `None` if the sub-params are missing or out of range
/// — in which case `slot` is left untouched.
fn parse_extended_color(params: &[i32], i: usize, slot: &mut Option<Color>) -> Option<usize> {
    match params.get(i + 1) {
        Some(5) => {
            let n = *params.get(i + 2)?;
            let n = u8::try_from(n).ok()?;
            *slot = Some(Color::Palette(n));
            Some(2)
        }
        Some(2) => {
            let r = as_u8(*params.get(i + 2)?)?;
            let g = as_u8(*params.get(i + 3)?)?;
            let b = as_u8(*params.get(i + 4)?)?;
            *slot = Some(Color::Rgb(r, g, b));
            Some(4)
        }
        _ => None,
    }
}

fn as_u8(v: i32) -> Option<u8> {
    u8::try_from(v).ok()
}

/// Merge `base` under `overlay`: a field present in `overlay` wins, else
/// `base`'s value (if any) carries through. Presence is tracked per field,
/// so an overlay that only sets `bold` leaves `fg`/`bg`/everything else
/// untouched.
#[must_use]
pub fn compose(base: &SgrAttributes, overlay: &SgrAttributes) -> SgrAttributes {
    SgrAttributes {
        fg: overlay.fg.or(base.fg),
        bg: overlay.bg.or(base.bg),
        bold: overlay.bold.or(base.bold),
        dim: overlay.dim.or(base.dim),
        italic: overlay.italic.or(base.italic),
        underline: overlay.underline.or(base.underline),
        blink: overlay.blink.or(base.blink),
        inverse: overlay.inverse.or(base.inverse),
        hidden: overlay.hidden.or(base.hidden),
        strikethrough: overlay.strikethrough.or(base.strikethrough),
    }
}

/// Emit the minimal `ESC [ ... m` sequence that reproduces `attrs`.
///
/// Bool codes are emitted in the fixed order `1,2,3,4,5,7,8,9` (only the
/// ones that are `Some(true)`), followed by `fg`, then `bg`. An empty
/// record yields the empty string.
#[must_use]
pub fn to_sequence(attrs: &SgrAttributes) -> String {
    let mut codes = Vec::with_capacity(4);

    for (flag, code) in [
        (attrs.bold, 1),
        (attrs.dim, 2),
        (attrs.italic, 3),
        (attrs.underline, 4),
        (attrs.blink, 5),
        (attrs.inverse, 7),
        (attrs.hidden, 8),
        (attrs.strikethrough, 9),
    ] {
        if flag == Some(true) {
            codes.push(code.to_string());
        }
    }
    if let Some(fg) = attrs.fg {
        codes.push(color_code(fg, 30, 90, 38));
    }
    if let Some(bg) = attrs.bg {
        codes.push(color_code(bg, 40, 100, 48));
    }

    if codes.is_empty() {
        return String::new();
    }
    format!("\x1b[{}m", codes.join(";"))
}

/// `base` is the standard-palette offset (30/40), `bright` the bright
/// offset (90/100), `extended` the 256-color command (38/48).
fn color_code(color: Color, base: u16, bright: u16, extended: u16) -> String {
    match color {
        Color::Rgb(r, g, b) => format!("{extended};2;{r};{g};{b}"),
        Color::Palette(c) if c < 8 => (base + u16::from(c)).to_string(),
        Color::Palette(c) if c < 16 => (bright + u16::from(c - 8)).to_string(),
        Color::Palette(c) => format!("{extended};5;{c}"),
    }
}

impl fmt::Display for SgrAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_sequence(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reset_wins_regardless_of_position() {
        assert_eq!(parse(&[1, 31, 0, 4]), SgrAttributes::default());
    }

    #[test]
    fn bools_set_true() {
        let attrs = parse(&[1, 3, 9]);
        assert_eq!(attrs.bold, Some(true));
        assert_eq!(attrs.italic, Some(true));
        assert_eq!(attrs.strikethrough, Some(true));
        assert_eq!(attrs.dim, None);
    }

    #[test]
    fn twenty_two_clears_bold_and_dim() {
        let attrs = parse(&[1, 2, 22]);
        assert_eq!(attrs.bold, Some(false));
        assert_eq!(attrs.dim, Some(false));
    }

    #[test]
    fn standard_and_bright_fg() {
        assert_eq!(parse(&[31]).fg, Some(Color::Palette(1)));
        assert_eq!(parse(&[93]).fg, Some(Color::Palette(8 + 3)));
    }

    #[test]
    fn extended_256_fg() {
        let attrs = parse(&[38, 5, 200]);
        assert_eq!(attrs.fg, Some(Color::Palette(200)));
    }

    #[test]
    fn extended_rgb_bg() {
        let attrs = parse(&[48, 2, 10, 20, 30]);
        assert_eq!(attrs.bg, Some(Color::Rgb(10, 20, 30)));
    }

    #[test]
    fn malformed_extended_color_leaves_attrs_unchanged() {
        let attrs = parse(&[38, 5]);
        assert_eq!(attrs.fg, None);
    }

    #[test]
    fn unset_fg_bg() {
        let attrs = parse(&[31, 41, 39, 49]);
        assert_eq!(attrs.fg, None);
        assert_eq!(attrs.bg, None);
    }

    #[test]
    fn compose_overlay_wins_per_field() {
        let base = parse(&[31, 1]);
        let overlay = parse(&[3]); // italic only
        let merged = compose(&base, &overlay);
        assert_eq!(merged.fg, Some(Color::Palette(1)));
        assert_eq!(merged.bold, Some(true));
        assert_eq!(merged.italic, Some(true));
    }

    #[test]
    fn to_sequence_fixed_order() {
        let attrs = parse(&[9, 1, 31]);
        assert_eq!(to_sequence(&attrs), "\x1b[1;9;31m");
    }

    #[test]
    fn to_sequence_empty_is_empty_string() {
        assert_eq!(to_sequence(&SgrAttributes::default()), "");
    }

    #[test]
    fn to_sequence_narrowest_color_form() {
        assert_eq!(to_sequence(&parse(&[31])), "\x1b[31m");
        assert_eq!(to_sequence(&parse(&[93])), "\x1b[93m");
        assert_eq!(to_sequence(&parse(&[38, 5, 200])), "\x1b[38;5;200m");
        assert_eq!(to_sequence(&parse(&[38, 2, 1, 2, 3])), "\x1b[38;2;1;2;3m");
    }

    #[test]
    fn round_trip_set_fields() {
        let original = parse(&[1, 3, 31, 48, 2, 9, 8, 7]);
        let reparsed = parse(&parse_back(&original));
        let merged = compose(&SgrAttributes::default(), &reparsed);
        assert_eq!(merged.fg, original.fg);
        assert_eq!(merged.bg, original.bg);
        assert_eq!(merged.bold, original.bold);
        assert_eq!(merged.italic, original.italic);
    }

    fn parse_back(attrs: &SgrAttributes) -> Vec<i32> {
        let seq = to_sequence(attrs);
        let inner = seq.trim_start_matches("\x1b[").trim_end_matches('m');
        inner.split(';').map(|s| s.parse().unwrap()).collect()
    }
}
