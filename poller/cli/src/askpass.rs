//! Askpass helper mode
//!
//! When a password is configured, ssh is told to run this same binary as
//! its `SSH_ASKPASS` program. ssh passes the prompt as the only argument
//! and reads the answer from stdout; the secret arrives through the
//! environment ssh inherited from the poller.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use netconf_poll_core::ASKPASS_SECRET_ENV;

/// Answer an askpass request if this process is one
///
/// Returns `None` for a normal invocation.
pub fn respond() -> Option<ExitCode> {
    let secret = std::env::var_os(ASKPASS_SECRET_ENV)?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    if !is_prompt(&args) {
        return None;
    }

    let mut stdout = std::io::stdout().lock();
    let written = stdout
        .write_all(secret.to_string_lossy().as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush());
    Some(if written.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// ssh calls askpass with exactly one argument, the prompt text
fn is_prompt(args: &[OsString]) -> bool {
    match args {
        [prompt] => !prompt.to_string_lossy().starts_with('-'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_detection() {
        assert!(is_prompt(&["admin@192.0.2.10's password: ".into()]));
        assert!(!is_prompt(&[]));
        assert!(!is_prompt(&["--help".into()]));
        assert!(!is_prompt(&["RSVP".into(), "-c".into(), "3".into()]));
    }
}
