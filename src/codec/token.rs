use std::fmt;
use std::ops::Range;

pub const SEPARATOR: char = '#';

pub const MSG_ON: &str = "on";
pub const MSG_OFF: &str = "off";
/// Only covers send this one.
pub const MSG_PAUSE: &str = "pause";

/// One positional field of a bemfa message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Token {
    #[default]
    Absent,
    Int(i64),
    Text(String),
}

impl Token {
    /// Parses a single wire field. Empty means absent, integers in canonical
    /// form become [`Token::Int`], anything else (`007`, `+12`, `21.5`) is
    /// kept as text so it renders back unchanged.
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        if field.is_empty() {
            return Token::Absent;
        }
        match field.parse::<i64>() {
            Ok(value) if value.to_string() == field => Token::Int(value),
            _ => Token::Text(field.to_string()),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Token::Text(value.into())
    }

    pub fn on_off(on: bool) -> Self {
        Token::text(if on { MSG_ON } else { MSG_OFF })
    }

    /// Integer value, also for non-canonical integer text like `007`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Token::Int(value) => Some(*value),
            Token::Text(value) => value.parse().ok(),
            Token::Absent => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Token::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is(&self, text: &str) -> bool {
        self.as_text() == Some(text)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Token::Absent)
    }
}

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token::Int(value)
    }
}

impl From<Option<i64>> for Token {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Token::Absent, Token::Int)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Absent => Ok(()),
            Token::Int(value) => write!(f, "{}", value),
            Token::Text(value) => f.write_str(value),
        }
    }
}

/// Ordered slots of one message. Trailing absent slots are never stored, so
/// two sequences that serialize to the same string compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSequence(Vec<Token>);

impl TokenSequence {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        while tokens.last().is_some_and(Token::is_absent) {
            tokens.pop();
        }
        Self(tokens)
    }

    /// Splits a raw payload on `#`. Never fails.
    pub fn parse(raw: &str) -> Self {
        raw.split(SEPARATOR).map(Token::parse).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.0
    }

    /// Sub-slice clamped to the sequence bounds; out-of-range yields empty.
    pub fn slice(&self, range: Range<usize>) -> &[Token] {
        let end = range.end.min(self.0.len());
        let start = range.start.min(end);
        &self.0[start..end]
    }

    pub fn to_message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TokenSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromIterator<Token> for TokenSequence {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
