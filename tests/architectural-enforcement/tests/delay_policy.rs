//! Integration Test: Cancellable Delays
//!
//! **Policy**: production code never blocks a thread to wait. Every timer
//! is a tokio sleep raced in a `select!` against cancellation, either
//! directly or through a helper that is itself a `select!` arm.
//!
//! Configured delays (settle, inter-iteration, response timeout) must stay
//! interruptible so Ctrl-C ends a run promptly and the session is closed.

use architectural_enforcement::{
    code_part, enclosing_fn, fn_name, production_sources, Violation,
};

/// Lines searched on each side of a sleep for its `select!`
const SELECT_WINDOW: usize = 10;

#[test]
fn test_no_thread_sleep_in_production_code() {
    let mut violations = Vec::new();

    for (path, lines) in production_sources() {
        for (idx, line) in lines.iter().enumerate() {
            if code_part(line).contains("thread::sleep(") {
                violations.push(Violation {
                    path: path.clone(),
                    line: idx + 1,
                    code: line.trim().to_string(),
                });
            }
        }
    }

    report("Thread-blocking sleep", &violations);
}

#[test]
fn test_every_timer_is_raced_against_cancellation() {
    let mut violations = Vec::new();

    for (path, lines) in production_sources() {
        for (idx, line) in lines.iter().enumerate() {
            if is_timer(code_part(line)) && !is_raced(&lines, idx) {
                violations.push(Violation {
                    path: path.clone(),
                    line: idx + 1,
                    code: line.trim().to_string(),
                });
            }
        }
    }

    report("Uncancellable timer", &violations);
}

#[test]
fn test_poller_delays_are_scanned() {
    // Guards against the scanner silently finding nothing
    let timers: usize = production_sources()
        .iter()
        .filter(|(path, _)| path.ends_with("poller.rs"))
        .map(|(_, lines)| lines.iter().filter(|l| is_timer(code_part(l))).count())
        .sum();
    assert!(timers >= 2, "expected the poller's delays to be found");
}

fn report(kind: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("\nFound {} {kind} violation(s)", violations.len());
}

fn is_timer(code: &str) -> bool {
    code.contains("time::sleep(") || code.contains("time::sleep_until(")
}

/// A timer is raced when a `select!` with a cancellation arm sits next to
/// it, or when its enclosing function is awaited as a `select!` arm.
fn is_raced<S: AsRef<str>>(lines: &[S], idx: usize) -> bool {
    let lines: Vec<String> = lines.iter().map(|l| l.as_ref().to_string()).collect();

    let start = idx.saturating_sub(SELECT_WINDOW);
    let end = (idx + SELECT_WINDOW + 1).min(lines.len());
    let window = &lines[start..end];
    let has_select = window.iter().any(|l| code_part(l).contains("select!"));
    let has_cancel = window.iter().any(|l| code_part(l).contains("cancelled()"));
    if has_select && has_cancel {
        return true;
    }

    let Some(name) = enclosing_fn(&lines, idx).and_then(fn_name) else {
        return false;
    };
    let arm = format!("= {name}(");
    lines
        .iter()
        .enumerate()
        .any(|(i, l)| i != idx && code_part(l).contains(&arm) && code_part(l).contains("=>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_next_to_sleep_is_raced() {
        let code = [
            "async fn pause(d: Duration, cancel: &CancellationToken) -> bool {",
            "    tokio::select! {",
            "        _ = cancel.cancelled() => false,",
            "        _ = tokio::time::sleep(d) => true,",
            "    }",
            "}",
        ];
        assert!(is_raced(&code, 3));
    }

    #[test]
    fn test_bare_sleep_is_not_raced() {
        let code = [
            "async fn wait() {",
            "    tokio::time::sleep(Duration::from_secs(1)).await;",
            "}",
        ];
        assert!(!is_raced(&code, 1));
    }

    #[test]
    fn test_helper_used_as_select_arm_is_raced() {
        let mut code = vec![
            "async fn deadline_reached(deadline: Option<Instant>) {",
            "    match deadline {",
            "        Some(deadline) => tokio::time::sleep_until(deadline).await,",
            "        None => std::future::pending().await,",
            "    }",
            "}",
        ];
        code.extend(std::iter::repeat("").take(2 * SELECT_WINDOW));
        code.push("    _ = deadline_reached(deadline) => {");
        assert!(is_raced(&code, 2));
    }

    #[test]
    fn test_timer_detection() {
        assert!(is_timer("let t = tokio::time::sleep(delay);"));
        assert!(is_timer("tokio::time::sleep_until(deadline).await"));
        assert!(!is_timer("tokio::time::timeout(EXIT_GRACE, task).await"));
    }
}
