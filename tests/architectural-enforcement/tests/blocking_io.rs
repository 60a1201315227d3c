//! Integration Test: Blocking I/O in Async Code
//!
//! **Policy**: inside `async fn`s, production code uses `tokio::fs`,
//! `tokio::process` and `tokio::io`. Synchronous functions (config loading,
//! the askpass helper) run outside the polling loop and are exempt.

use architectural_enforcement::{code_part, enclosing_fn, production_sources, Violation};

const FORBIDDEN: [&str; 4] = [
    "std::fs::",
    "std::process::Command",
    "std::net::",
    "std::io::stdin",
];

#[test]
fn test_no_blocking_io_in_async_functions() {
    let mut violations = Vec::new();

    for (path, lines) in production_sources() {
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if !FORBIDDEN.iter().any(|call| code.contains(call)) {
                continue;
            }
            let in_async = enclosing_fn(&lines, idx).is_some_and(|sig| sig.contains("async fn"));
            if in_async {
                violations.push(Violation {
                    path: path.clone(),
                    line: idx + 1,
                    code: line.trim().to_string(),
                });
            }
        }
    }

    for violation in &violations {
        eprintln!("  {violation}");
    }
    assert!(
        violations.is_empty(),
        "Found {} blocking I/O call(s) in async code",
        violations.len()
    );
}
