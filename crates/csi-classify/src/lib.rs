//! Parses a CSI token's parameter string into numeric fields and tags which
//! aspect of a line the command touches, so an emission strategy can tell a
//! style change from a cursor move from an erasure without re-parsing.

use smallvec::SmallVec;

/// Which aspect(s) of a line a CSI command affects.
///
/// Every command in the dispatch table affects at most one aspect today;
/// this is a struct of independent flags (rather than an enum) so a future
/// command that touches more than one aspect doesn't need a new variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Affects {
    pub style: bool,
    pub cursor: bool,
    pub erasure: bool,
}

/// A CSI sequence split into its command byte, numeric parameters, and
/// the line aspects it affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub cmd: char,
    pub params: SmallVec<[i32; 4]>,
    pub affects: Affects,
}

/// Classify a CSI sequence's parameter string and command byte.
///
/// `params_str` is the raw text between `ESC [` and the final byte (so it
/// never includes `cmd` itself). Blank or non-numeric fields parse as `0`;
/// an empty `params_str` yields `[0]`.
#[must_use]
pub fn classify(params_str: &str, cmd: char) -> Classified {
    Classified {
        cmd,
        params: parse_params(params_str),
        affects: affects_of(cmd),
    }
}

fn parse_params(params_str: &str) -> SmallVec<[i32; 4]> {
    if params_str.is_empty() {
        return SmallVec::from_slice(&[0]);
    }
    params_str
        .split(';')
        .map(|field| field.parse::<i32>().unwrap_or(0))
        .collect()
}

fn affects_of(cmd: char) -> Affects {
    match cmd {
        'm' => Affects {
            style: true,
            ..Affects::default()
        },
        'G' | 'C' | 'D' | '`' | 's' | 'u' => Affects {
            cursor: true,
            ..Affects::default()
        },
        'K' | 'X' | 'P' | '@' => Affects {
            erasure: true,
            ..Affects::default()
        },
        // 'A', 'B', 'H', 'f', 'J', 'S', 'T', 'L', 'M', and anything else:
        // no tag, per the vertical/full-screen motions this line model
        // doesn't track.
        _ => Affects::default(),
    }
}
