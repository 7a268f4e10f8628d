//! Ignore-pattern merging for packaging.
//!
//! Patterns follow a small gitignore subset: one glob per line, `#` comments,
//! a trailing `/` matches directories only, a leading `/` (or any inner `/`)
//! anchors the pattern at the project root, and anything else matches an
//! entry's file name at any depth. Negation (`!`) is not supported.

use std::path::Path;

use glob::{MatchOptions, Pattern};

/// Always excluded: VCS metadata and hoist's own files.
pub const BUILTIN_EXCLUDES: &[&str] = &[".git/", ".hoist/", "/hoist.yaml", ".hoistignore"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Pattern,
    dir_only: bool,
    anchored: bool,
}

/// Merged set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    rules: Vec<IgnoreRule>,
}

impl IgnoreSet {
    /// A set holding only [`BUILTIN_EXCLUDES`].
    #[must_use]
    pub fn builtin() -> Self {
        let mut set = Self::default();
        for p in BUILTIN_EXCLUDES {
            set.add_line(p);
        }
        set
    }

    /// Merge the lines of one ignore file.
    ///
    /// Returns the lines that were skipped (negations and invalid globs).
    pub fn add_source(&mut self, contents: &str) -> Vec<String> {
        contents
            .lines()
            .filter(|line| !self.add_line(line))
            .map(str::to_owned)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `true` when a line was accepted or is a comment/blank line.
    fn add_line(&mut self, raw: &str) -> bool {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return true;
        }
        if line.starts_with('!') {
            return false;
        }
        let (body, dir_only) = match line.strip_suffix('/') {
            Some(b) => (b, true),
            None => (line, false),
        };
        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return false;
        }
        match Pattern::new(body) {
            Ok(pattern) => {
                self.rules.push(IgnoreRule {
                    pattern,
                    dir_only,
                    anchored,
                });
                true
            }
            Err(_) => false,
        }
    }

    /// Whether the entry at `rel` (relative to the project root) is excluded.
    #[must_use]
    pub fn is_ignored(&self, rel: &Path, is_dir: bool) -> bool {
        let full = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.rules.iter().any(|rule| {
            if rule.dir_only && !is_dir {
                return false;
            }
            let subject = if rule.anchored { &full } else { &name };
            rule.pattern.matches_with(subject, MATCH_OPTIONS)
        })
    }
}
