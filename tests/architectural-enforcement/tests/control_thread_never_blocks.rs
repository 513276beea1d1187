//! Integration Test: Control Thread Never Blocks
//!
//! **Policy**: The dispatcher, state and queue run on the control thread
//! once per tick. They MUST NOT sleep, block on a channel, or enter a
//! runtime. Only the transport's worker drives async I/O.
//!
//! **Required**: `try_recv`-style polling; `tokio::time::sleep` inside the
//! worker loop only.

use architectural_enforcement::{scan_directory, workspace_path, Pattern};

const BLOCKING: &[Pattern] = &[
    Pattern { needle: "thread::sleep", rule: "Blocking sleep" },
    Pattern { needle: "block_on", rule: "Runtime entry" },
    Pattern { needle: "blocking_recv", rule: "Blocking receive" },
    Pattern { needle: ".recv()", rule: "Blocking receive" },
];

const CONTROL_THREAD_FILES: &[&str] = &[
    "session/core/src/dispatcher.rs",
    "session/core/src/state.rs",
    "session/core/src/queue.rs",
    "session/core/src/board.rs",
    "session/core/src/protocol.rs",
];

#[test]
fn test_control_thread_modules_never_block() {
    let mut violations = Vec::new();
    for file in CONTROL_THREAD_FILES {
        violations.extend(scan_directory(&workspace_path(file), BLOCKING));
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking calls found on the control thread!");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED: poll with try_pop/try_recv, sleep only in the worker loop");
        panic!("\nFound {} blocking call(s).", violations.len());
    }
}

#[test]
fn test_worker_sleeps_asynchronously() {
    let transport = workspace_path("session/core/src/transport.rs");
    let violations = scan_directory(
        &transport,
        &[Pattern { needle: "thread::sleep", rule: "Blocking sleep in worker loop" }],
    );
    assert!(violations.is_empty(), "{violations:?}");
}
