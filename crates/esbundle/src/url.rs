//! Document URLs and the path arithmetic the bundler needs on them.
//!
//! A [`DocumentUrl`] is produced by the resolver and compared structurally.
//! The bundler only ever looks inside it to compute relative specifiers between
//! bundles, to place generated shared bundles and to derive readable identifiers
//! from the file stem.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical identifier of one source document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentUrl(String);

impl DocumentUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part including the trailing slash, or `""` at the top level
    pub fn directory(&self) -> &str {
        self.0.rfind('/').map_or("", |idx| &self.0[..=idx])
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.0.rfind('/').map_or(self.0.as_str(), |idx| &self.0[idx + 1..])
    }

    /// File name without its extension: `lib/b.js` -> `b`
    pub fn stem(&self) -> &str {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            Some(idx) if idx > 0 => &file_name[..idx],
            _ => file_name,
        }
    }

    /// Resolve a relative specifier against this document's directory
    ///
    /// `./` and `../` segments are folded; a leading `/` resolves from the top
    /// level. Bare specifiers are taken as top-level URLs unchanged.
    pub fn join(&self, specifier: &str) -> Self {
        if let Some(absolute) = specifier.strip_prefix('/') {
            return Self(normalize_segments(absolute));
        }
        if is_relative_specifier(specifier) {
            return Self(normalize_segments(&format!(
                "{}{}",
                self.directory(),
                specifier
            )));
        }
        Self(specifier.to_owned())
    }

    /// Specifier that a module living at `self` uses to import `target`
    ///
    /// Always starts with `./` or `../` so the result is never mistaken for a
    /// bare package specifier.
    pub fn relative_specifier(&self, target: &Self) -> String {
        let from_dirs: Vec<&str> = split_directory(self.directory());
        let target_dirs: Vec<&str> = split_directory(target.directory());

        let common = from_dirs
            .iter()
            .zip(&target_dirs)
            .take_while(|(a, b)| a == b)
            .count();

        let mut specifier = String::new();
        if from_dirs.len() == common {
            specifier.push_str("./");
        } else {
            for _ in common..from_dirs.len() {
                specifier.push_str("../");
            }
        }
        for dir in &target_dirs[common..] {
            specifier.push_str(dir);
            specifier.push('/');
        }
        specifier.push_str(target.file_name());
        specifier
    }
}

impl fmt::Display for DocumentUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for DocumentUrl {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Check whether a specifier is relative to the importing document
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Deepest directory shared by every URL, with trailing slash
pub fn common_directory<'a>(urls: impl IntoIterator<Item = &'a DocumentUrl>) -> String {
    let mut common: Option<Vec<&str>> = None;
    for url in urls {
        let dirs = split_directory(url.directory());
        common = Some(match common {
            None => dirs,
            Some(prev) => prev
                .into_iter()
                .zip(dirs)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    common
        .unwrap_or_default()
        .iter()
        .fold(String::new(), |mut acc, dir| {
            acc.push_str(dir);
            acc.push('/');
            acc
        })
}

fn split_directory(directory: &str) -> Vec<&str> {
    directory.split('/').filter(|seg| !seg.is_empty()).collect()
}

fn normalize_segments(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), None | Some(&"..")) {
                    segments.push("..");
                } else {
                    segments.pop();
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

const RESERVED_NAMES: &[&str] = &[
    "arguments",
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "eval",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "implements",
    "import",
    "in",
    "instanceof",
    "interface",
    "let",
    "NaN",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "static",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "undefined",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

static ILLEGAL_CHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w$]").expect("identifier pattern is a valid regex"));

/// Turn an arbitrary string (usually a file stem) into a legal JS identifier
pub fn make_legal_identifier(value: &str) -> String {
    let replaced = ILLEGAL_CHARACTERS.replace_all(value, "_");
    let value: &str = &replaced;

    let needs_escape = value.is_empty()
        || value.starts_with(|c: char| c.is_ascii_digit())
        || RESERVED_NAMES.contains(&value);

    if needs_escape {
        let escaped = format!("_{value}");
        log::trace!("identifier '{value}' is not legal, using '{escaped}'");
        escaped
    } else {
        value.to_owned()
    }
}
