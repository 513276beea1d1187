//! Integration Test: Library Purity
//!
//! **Policy**: `session-core` never touches the console and never panics on
//! a production path. Console output and input live in `session-cli`;
//! failures are returned as typed errors or modelled as session state.
//!
//! **Acceptable**: test modules, doc comments, `unwrap_or*` fallbacks.

use architectural_enforcement::{scan_directory, workspace_path, Pattern};

const CONSOLE_IO: &[Pattern] = &[
    Pattern { needle: "println!", rule: "Console output" },
    Pattern { needle: "print!", rule: "Console output" },
    Pattern { needle: "eprintln!", rule: "Console output" },
    Pattern { needle: "eprint!", rule: "Console output" },
    Pattern { needle: "dbg!", rule: "Console output" },
    Pattern { needle: "stdin()", rule: "Console input" },
];

const PANICS: &[Pattern] = &[
    Pattern { needle: ".unwrap()", rule: "Panicking unwrap" },
    Pattern { needle: ".expect(", rule: "Panicking expect" },
    Pattern { needle: "panic!(", rule: "Explicit panic" },
    Pattern { needle: "unreachable!(", rule: "Explicit panic" },
];

fn report(title: &str, violations: &[architectural_enforcement::Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {title}");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) in session-core.\nFix these before merging!",
        violations.len()
    );
}

#[test]
fn test_no_console_io_in_library() {
    let violations = scan_directory(&workspace_path("session/core/src"), CONSOLE_IO);
    report("Console I/O found in session-core", &violations);
}

#[test]
fn test_no_panics_in_library() {
    let violations = scan_directory(&workspace_path("session/core/src"), PANICS);
    report("Panicking calls found in session-core", &violations);
}

#[test]
fn test_library_sources_are_scanned() {
    // Guards against a wrong path silently passing every scan
    let root = workspace_path("session/core/src");
    assert!(root.join("lib.rs").exists(), "missing {}", root.display());
}
