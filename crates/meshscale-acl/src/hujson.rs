//! lexical normalization of the policy json superset.
//!
//! policy files may contain `//` and `/* */` comments and trailing
//! commas. [`normalize`] rewrites such a document into strict json.
//! comments are replaced with spaces and newlines are preserved, so byte
//! positions reported by the json parser still point at the right line
//! and column of the original document.

use thiserror::Error;

/// errors from the lexical normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// a `/*` comment was never closed.
    #[error("unterminated block comment starting on line {line}")]
    UnterminatedBlockComment {
        /// 1-based line the comment opened on.
        line: usize,
    },
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    InString { escaped: bool },
    LineComment,
    BlockComment { opened_on: usize },
}

/// rewrite a json-with-comments document into strict json.
pub fn normalize(input: &str) -> Result<String, NormalizeError> {
    let stripped = strip_comments(input)?;
    Ok(strip_trailing_commas(&stripped))
}

fn strip_comments(input: &str) -> Result<String, NormalizeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Normal;
    let mut line = 1usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            line += 1;
        }
        match state {
            State::Normal => match b {
                b'"' => {
                    state = State::InString { escaped: false };
                    out.push(b);
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    state = State::LineComment;
                    out.extend_from_slice(b"  ");
                    i += 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment { opened_on: line };
                    out.extend_from_slice(b"  ");
                    i += 1;
                }
                _ => out.push(b),
            },
            State::InString { escaped } => {
                if !escaped && b == b'"' {
                    state = State::Normal;
                } else {
                    state = State::InString {
                        escaped: !escaped && b == b'\\',
                    };
                }
                out.push(b);
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                    out.push(b);
                } else {
                    out.push(b' ');
                }
            }
            State::BlockComment { .. } => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = State::Normal;
                    out.extend_from_slice(b"  ");
                    i += 1;
                } else if b == b'\n' {
                    out.push(b);
                } else {
                    out.push(b' ');
                }
            }
        }
        i += 1;
    }

    if let State::BlockComment { opened_on } = state {
        return Err(NormalizeError::UnterminatedBlockComment { line: opened_on });
    }

    // an unterminated string is left for the json parser to report.
    // substitutions are ascii-only over already-valid utf-8.
    Ok(String::from_utf8(out).expect("ascii-only substitutions"))
}

fn strip_trailing_commas(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            out.push(b);
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                out.push(b);
            }
            b',' => {
                let next = bytes[i + 1..].iter().find(|c| !c.is_ascii_whitespace());
                if matches!(next, Some(b'}') | Some(b']')) {
                    out.push(b' ');
                } else {
                    out.push(b);
                }
            }
            _ => out.push(b),
        }
    }

    String::from_utf8(out).expect("ascii-only substitutions")
}
