//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the session library honest:
//! - No console I/O in the library (presentation belongs to the binary)
//! - No panicking shortcuts in production paths
//! - No blocking sleeps on the control thread
//!
//! Test modules are excluded: scanning stops at the first `#[cfg(test)]`
//! in each file, which is where this workspace keeps them.

use std::fs;
use std::path::{Path, PathBuf};

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub rule: &'static str,
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// A forbidden substring and the rule it breaks
pub struct Pattern {
    pub needle: &'static str,
    pub rule: &'static str,
}

/// Absolute path of a directory relative to the workspace root
pub fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

/// Scan every `.rs` file under `dir` for `patterns`
pub fn scan_directory(dir: &Path, patterns: &[Pattern]) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !dir.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            if let Ok(content) = fs::read_to_string(entry.path()) {
                violations.extend(scan_source(entry.path(), &content, patterns));
            }
        }
    }

    violations
}

/// Scan one file's production code
pub fn scan_source(path: &Path, content: &str, patterns: &[Pattern]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }

        let code_part = line.split("//").next().unwrap_or(line);
        for pattern in patterns {
            if code_part.contains(pattern.needle) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    rule: pattern.rule,
                    text: trimmed.to_string(),
                });
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERNS: &[Pattern] = &[Pattern {
        needle: ".unwrap()",
        rule: "Panicking unwrap",
    }];

    #[test]
    fn test_scan_skips_comments_and_test_modules() {
        let source = "\
fn real() {
    let x = value.unwrap();
}
// value.unwrap() in a comment
/// docs mention .unwrap() too
#[cfg(test)]
mod tests {
    fn t() { value.unwrap(); }
}
";
        let violations = scan_source(Path::new("lib.rs"), source, PATTERNS);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
        assert_eq!(violations[0].rule, "Panicking unwrap");
    }

    #[test]
    fn test_trailing_comment_is_ignored() {
        let source = "let a = 1; // not .unwrap() really\n";
        assert!(scan_source(Path::new("x.rs"), source, PATTERNS).is_empty());
    }
}
