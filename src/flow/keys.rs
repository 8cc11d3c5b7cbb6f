//! Key patterns accepted by a state and the digit input they are matched
//! against.
//!
//! ```text
//! "1" "*"        single key
//! "123#"         literal sequence, terminated by the collector key
//! "#"            collector: any run of digits
//! ".5"           wildcard: up to 5 digits
//! ".:num_opts"   wildcard, limit provided by the `num_opts` callback
//! ```

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The key that terminates a collected run of digits.
pub const COLLECTOR_KEY: char = '#';

fn is_dtmf_key(c: char) -> bool {
    c.is_ascii_digit() || c == '*'
}

/// Upper bound on the digits a wildcard accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DigitLimit {
    Fixed(usize),
    /// Resolved at run time through a text callback on the domain object.
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    Key(char),
    Sequence(String),
    Collector,
    Wildcard(DigitLimit),
}

impl KeyPattern {
    /// Single keys and literal sequences are looked up before any pattern.
    pub fn is_exact(&self) -> bool {
        matches!(self, KeyPattern::Key(_) | KeyPattern::Sequence(_))
    }

    /// True when the pattern gathers a `#`-terminated run of digits.
    pub fn is_collecting(&self) -> bool {
        matches!(self, KeyPattern::Collector | KeyPattern::Sequence(_))
    }

    pub(crate) fn matches_exact(&self, input: &Digits) -> bool {
        match self {
            KeyPattern::Key(key) => input.single() == Some(*key),
            KeyPattern::Sequence(seq) => input.len() > 1 && input.body() == seq,
            _ => false,
        }
    }

    /// Matches collector and wildcard patterns. `limit` is the resolved
    /// digit limit for wildcards and is ignored otherwise.
    pub(crate) fn matches_run(&self, input: &Digits, limit: Option<usize>) -> bool {
        let body = input.body();
        if body.is_empty() || !body.chars().all(is_dtmf_key) {
            return false;
        }
        match self {
            KeyPattern::Collector => true,
            KeyPattern::Wildcard(_) => {
                let max = limit.unwrap_or(0);
                body.chars().all(|c| c.is_ascii_digit()) && body.len() <= max
            }
            _ => false,
        }
    }
}

impl FromStr for KeyPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty key".to_string());
        }
        if s.len() == 1 && s.starts_with(COLLECTOR_KEY) {
            return Ok(KeyPattern::Collector);
        }
        if let Some(rest) = s.strip_prefix('.') {
            if let Some(name) = rest.strip_prefix(':') {
                if name.is_empty() {
                    return Err("wildcard callback name is empty".to_string());
                }
                return Ok(KeyPattern::Wildcard(DigitLimit::Callback(name.to_string())));
            }
            let max: usize = rest
                .parse()
                .map_err(|_| format!("wildcard limit '{}' is not a number", rest))?;
            if max == 0 {
                return Err("wildcard must accept at least one digit".to_string());
            }
            return Ok(KeyPattern::Wildcard(DigitLimit::Fixed(max)));
        }
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return if is_dtmf_key(c) {
                Ok(KeyPattern::Key(c))
            } else {
                Err(format!("'{}' is not a telephone key", c))
            };
        }
        match s.strip_suffix(COLLECTOR_KEY) {
            Some(seq) if !seq.is_empty() && seq.chars().all(is_dtmf_key) => {
                Ok(KeyPattern::Sequence(seq.to_string()))
            }
            _ => Err(format!("multi-digit keys must be digits ending in '{}'", COLLECTOR_KEY)),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Key(c) => write!(f, "{}", c),
            KeyPattern::Sequence(seq) => write!(f, "{}{}", seq, COLLECTOR_KEY),
            KeyPattern::Collector => write!(f, "{}", COLLECTOR_KEY),
            KeyPattern::Wildcard(DigitLimit::Fixed(max)) => write!(f, ".{}", max),
            KeyPattern::Wildcard(DigitLimit::Callback(name)) => write!(f, ".:{}", name),
        }
    }
}

/// Digits received from the telephony layer: a bare number, a single key or
/// a `#`-terminated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digits(String);

impl Digits {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key when exactly one was pressed.
    pub fn single(&self) -> Option<char> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    /// Digits without the trailing collector key.
    pub fn body(&self) -> &str {
        self.0.strip_suffix(COLLECTOR_KEY).unwrap_or(&self.0)
    }
}

impl fmt::Display for Digits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Digits {
    fn from(s: &str) -> Self {
        Digits(s.trim().to_string())
    }
}

impl From<String> for Digits {
    fn from(s: String) -> Self {
        Digits::from(s.as_str())
    }
}

impl From<&String> for Digits {
    fn from(s: &String) -> Self {
        Digits::from(s.as_str())
    }
}

impl From<char> for Digits {
    fn from(c: char) -> Self {
        Digits(c.to_string())
    }
}

macro_rules! digits_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Digits {
            fn from(n: $t) -> Self {
                Digits(n.to_string())
            }
        })*
    };
}

digits_from_int!(u8, u16, u32, u64, usize, i32, i64);

/// How the telephony layer should gather input for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GatherSpec {
    /// Maximum digits to collect, when no terminating key is used.
    pub num_digits: Option<usize>,
    pub finish_on_key: Option<char>,
}
