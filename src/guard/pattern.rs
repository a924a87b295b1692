//! Glob-like path patterns for page exclusion

use regex::Regex;

/// A compiled exclusion pattern.
///
/// `**` matches any sequence including `/`, `*` matches a run of characters
/// that are neither whitespace nor `/`. The pattern is anchored at both ends
/// and tolerates one trailing `/` on the path.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let source = pattern.trim().to_string();
        let regex = Regex::new(&translate(&source))?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `path`, ignoring any query string.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.regex.is_match(path)
    }
}

fn translate(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '*' {
            literal.push(c);
            continue;
        }
        out.push_str(&regex::escape(&literal));
        literal.clear();
        if chars.peek() == Some(&'*') {
            chars.next();
            out.push_str(".*");
        } else {
            out.push_str(r"[^\s/]*");
        }
    }

    out.push_str(&regex::escape(&literal));
    out.push_str("/?$");
    out
}
