//! Template marker grammar.
//!
//! A marker is `${` followed by an identifier and any number of `.identifier`
//! or `[digits]` groups, closed by `}`. Identifiers start with a letter or
//! underscore and may contain letters, digits, `_` and `-` (node ids such as
//! `fetch-data` are common). Nothing else is recognised as a template.

use regex::{Match, Regex};
use std::sync::OnceLock;
use thiserror::Error;

/// Sequence that opens a template marker.
pub const MARKER_OPEN: &str = "${";

const TEMPLATE_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z_][A-Za-z0-9_-]*|\[[0-9]+\])*)\}";

fn template_regex() -> &'static Regex {
    static TEMPLATE_RE: OnceLock<Regex> = OnceLock::new();
    TEMPLATE_RE.get_or_init(|| Regex::new(TEMPLATE_PATTERN).expect("template pattern compiles"))
}

/// One step of a template path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{}", name),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("template path is empty")]
    Empty,
    #[error("template path must start with an identifier: '{0}'")]
    MissingRoot(String),
    #[error("invalid character '{ch}' at offset {offset} in template path '{path}'")]
    InvalidCharacter {
        path: String,
        ch: char,
        offset: usize,
    },
    #[error("unclosed or non-numeric index in template path '{0}'")]
    InvalidIndex(String),
}

/// Iterate the valid markers in `text`, yielding the full match and its path.
pub fn markers(text: &str) -> impl Iterator<Item = (Match<'_>, &str)> {
    template_regex().captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let path = caps.get(1)?.as_str();
        Some((whole, path))
    })
}

/// Paths of every valid marker in `text`, in order of appearance.
pub fn template_paths(text: &str) -> Vec<&str> {
    markers(text).map(|(_, path)| path).collect()
}

pub fn contains_template(text: &str) -> bool {
    template_regex().is_match(text)
}

/// Return the path when `text` is exactly one marker with nothing around it.
///
/// This is the single predicate deciding "simple" (type preserving, JSON
/// auto-parse eligible) versus "complex" (always stringified) templates; the
/// resolver and the validator both go through it.
pub fn simple_template_path(text: &str) -> Option<&str> {
    let (whole, path) = markers(text).next()?;
    if whole.start() == 0 && whole.end() == text.len() {
        Some(path)
    } else {
        None
    }
}

/// Number of `${` openings in `text`, valid or not.
pub fn count_marker_openings(text: &str) -> usize {
    text.matches(MARKER_OPEN).count()
}

/// Compare openings with valid markers; `Some((openings, valid))` on mismatch.
pub fn marker_mismatch(text: &str) -> Option<(usize, usize)> {
    let openings = count_marker_openings(text);
    let valid = markers(text).count();
    if openings != valid {
        Some((openings, valid))
    } else {
        None
    }
}

/// Split a path such as `node.items[2].name` into its segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let chars: Vec<(usize, char)> = path.char_indices().collect();
    let mut segments = Vec::new();

    let read_ident = |start: usize| -> usize {
        let mut end = start;
        while end < chars.len() {
            let ch = chars[end].1;
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                end += 1;
            } else {
                break;
            }
        }
        end
    };

    let first = chars[0].1;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(PathError::MissingRoot(path.to_string()));
    }
    let end = read_ident(0);
    segments.push(PathSegment::Field(collect(&chars[0..end])));
    let mut pos = end;

    while pos < chars.len() {
        match chars[pos].1 {
            '.' => {
                let start = pos + 1;
                let valid_start = chars
                    .get(start)
                    .map(|(_, ch)| ch.is_ascii_alphabetic() || *ch == '_')
                    .unwrap_or(false);
                if !valid_start {
                    return Err(PathError::InvalidCharacter {
                        path: path.to_string(),
                        ch: '.',
                        offset: chars[pos].0,
                    });
                }
                let end = read_ident(start);
                segments.push(PathSegment::Field(collect(&chars[start..end])));
                pos = end;
            }
            '[' => {
                let start = pos + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1.is_ascii_digit() {
                    end += 1;
                }
                if end == start || end >= chars.len() || chars[end].1 != ']' {
                    return Err(PathError::InvalidIndex(path.to_string()));
                }
                let index = collect(&chars[start..end])
                    .parse::<usize>()
                    .map_err(|_| PathError::InvalidIndex(path.to_string()))?;
                segments.push(PathSegment::Index(index));
                pos = end + 1;
            }
            ch => {
                return Err(PathError::InvalidCharacter {
                    path: path.to_string(),
                    ch,
                    offset: chars[pos].0,
                })
            }
        }
    }
    Ok(segments)
}

fn collect(chars: &[(usize, char)]) -> String {
    chars.iter().map(|(_, ch)| *ch).collect()
}

/// Split off the root identifier: `repo.name[0]` gives `("repo", "name[0]")`.
pub fn split_root(path: &str) -> (&str, &str) {
    let cut = path.find(['.', '[']).unwrap_or(path.len());
    let (root, rest) = path.split_at(cut);
    (root, rest.strip_prefix('.').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_dotted_and_indexed_paths() {
        let text = "cat ${read.content} | head ${opts.lines[2].n} ${fetch-data.body}";
        assert_eq!(
            template_paths(text),
            vec!["read.content", "opts.lines[2].n", "fetch-data.body"]
        );
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(template_paths("${items[-1]}").is_empty());
        assert!(template_paths("${items[x]}").is_empty());
        assert!(template_paths("${}").is_empty());
        assert!(template_paths("${'quoted'}").is_empty());
        assert!(template_paths("${1abc}").is_empty());
    }

    #[test]
    fn simple_template_requires_whole_string() {
        assert_eq!(simple_template_path("${a.b}"), Some("a.b"));
        assert_eq!(simple_template_path("${a.b} "), None);
        assert_eq!(simple_template_path("x${a.b}"), None);
        assert_eq!(simple_template_path("${a}${b}"), None);
        assert_eq!(simple_template_path("plain"), None);
    }

    #[test]
    fn mismatch_counts_broken_markers() {
        assert_eq!(marker_mismatch("${a.b}"), None);
        assert_eq!(marker_mismatch("${a.b"), Some((1, 0)));
        assert_eq!(marker_mismatch("${} and ${ok}"), Some((2, 1)));
        assert_eq!(marker_mismatch("${${a}}"), Some((2, 1)));
        assert_eq!(marker_mismatch("no markers"), None);
    }

    #[test]
    fn parses_segments() {
        assert_eq!(
            parse_path("n.items[0].name").unwrap(),
            vec![
                PathSegment::Field("n".into()),
                PathSegment::Field("items".into()),
                PathSegment::Index(0),
                PathSegment::Field("name".into()),
            ]
        );
        assert_eq!(parse_path(""), Err(PathError::Empty));
        assert!(parse_path("a[1").is_err());
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("[0]").is_err());
    }

    #[test]
    fn splits_root_from_rest() {
        assert_eq!(split_root("repo"), ("repo", ""));
        assert_eq!(split_root("repo.owner.login"), ("repo", "owner.login"));
        assert_eq!(split_root("items[0].id"), ("items", "[0].id"));
    }
}
