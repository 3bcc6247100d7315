//! Dot-notation parsing for paths and path patterns.
//!
//! Grammar:
//! - `key` or `.key` for a bare mapping key (no `.`, `[`, `]`, `"`, `\` or whitespace)
//! - `[3]` for a sequence index
//! - `["any key"]` for a quoted mapping key, with `\"` and `\\` escapes
//! - `*` or `[*]` for a wildcard segment (patterns only)

use super::path::{Path, PathElement};
use thiserror::Error;

/// PathParseError reports a malformed dot-notation string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("{input:?}: unexpected {found:?} at offset {offset}")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },

    #[error("{input:?}: empty segment at offset {offset}")]
    EmptySegment { input: String, offset: usize },

    #[error("{input:?}: unterminated bracket")]
    Unterminated { input: String },

    #[error("{input:?}: invalid index {index:?}")]
    InvalidIndex { input: String, index: String },

    #[error("{input:?}: wildcard segments are only allowed in patterns")]
    WildcardInPath { input: String },
}

/// One parsed segment, before deciding whether wildcards are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<RawSegment>, PathParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if segments.is_empty() {
                    return Err(PathParseError::Unexpected {
                        input: input.to_string(),
                        offset: i,
                        found: '.',
                    });
                }
                i += 1;
                if i >= chars.len() || matches!(chars[i], '.' | '[') {
                    return Err(PathParseError::EmptySegment {
                        input: input.to_string(),
                        offset: i,
                    });
                }
                let (segment, next) = bare_segment(input, &chars, i)?;
                segments.push(segment);
                i = next;
            }
            '[' => {
                let (segment, next) = bracket_segment(input, &chars, i)?;
                segments.push(segment);
                i = next;
            }
            _ if segments.is_empty() => {
                let (segment, next) = bare_segment(input, &chars, i)?;
                segments.push(segment);
                i = next;
            }
            c => {
                return Err(PathParseError::Unexpected {
                    input: input.to_string(),
                    offset: i,
                    found: c,
                });
            }
        }
    }

    Ok(segments)
}

fn bare_segment(
    input: &str,
    chars: &[char],
    start: usize,
) -> Result<(RawSegment, usize), PathParseError> {
    let mut end = start;
    while end < chars.len() && !matches!(chars[end], '.' | '[') {
        let c = chars[end];
        if matches!(c, ']' | '"' | '\\') || c.is_whitespace() {
            return Err(PathParseError::Unexpected {
                input: input.to_string(),
                offset: end,
                found: c,
            });
        }
        end += 1;
    }
    if end == start {
        return Err(PathParseError::EmptySegment {
            input: input.to_string(),
            offset: start,
        });
    }
    let text: String = chars[start..end].iter().collect();
    let segment = if text == "*" {
        RawSegment::Wildcard
    } else {
        RawSegment::Key(text)
    };
    Ok((segment, end))
}

fn bracket_segment(
    input: &str,
    chars: &[char],
    start: usize,
) -> Result<(RawSegment, usize), PathParseError> {
    let unterminated = || PathParseError::Unterminated {
        input: input.to_string(),
    };
    let mut i = start + 1;

    if i < chars.len() && chars[i] == '"' {
        i += 1;
        let mut key = String::new();
        loop {
            match chars.get(i) {
                None => return Err(unterminated()),
                Some('\\') => {
                    let escaped = chars.get(i + 1).ok_or_else(unterminated)?;
                    key.push(*escaped);
                    i += 2;
                }
                Some('"') => {
                    i += 1;
                    break;
                }
                Some(c) => {
                    key.push(*c);
                    i += 1;
                }
            }
        }
        if chars.get(i) != Some(&']') {
            return Err(unterminated());
        }
        return Ok((RawSegment::Key(key), i + 1));
    }

    let close = chars[i..]
        .iter()
        .position(|c| *c == ']')
        .map(|p| p + i)
        .ok_or_else(unterminated)?;
    let body: String = chars[i..close].iter().collect();
    if body == "*" {
        return Ok((RawSegment::Wildcard, close + 1));
    }
    let index = body
        .parse::<usize>()
        .map_err(|_| PathParseError::InvalidIndex {
            input: input.to_string(),
            index: body.clone(),
        })?;
    Ok((RawSegment::Index(index), close + 1))
}

/// Parses a concrete path. Wildcards are rejected.
pub fn parse_path(input: &str) -> Result<Path, PathParseError> {
    tokenize(input)?
        .into_iter()
        .map(|segment| match segment {
            RawSegment::Key(k) => Ok(PathElement::FieldName(k)),
            RawSegment::Index(i) => Ok(PathElement::Index(i)),
            RawSegment::Wildcard => Err(PathParseError::WildcardInPath {
                input: input.to_string(),
            }),
        })
        .collect()
}
