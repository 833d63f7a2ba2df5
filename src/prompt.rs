//! Operator decision seam.
//!
//! Replay asks yes/no questions while it works (port this unit, conflict
//! resolved, push the branch). The [`Decider`] trait keeps those questions
//! out of the engine so tests can script answers; [`Interactive`] is the
//! real stdin implementation.

use std::io::{self, BufRead, Write};

/// Answers yes/no questions during a porting session.
pub trait Decider {
    /// Ask a yes/no question. The default answer is "no".
    ///
    /// # Errors
    /// Returns an error if the answer channel is unavailable.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Prompts on stdout and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct Interactive;

impl Decider for Interactive {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let stdin = io::stdin();
        read_confirmation(&mut stdin.lock(), &mut io::stdout(), question)
    }
}

/// Fails on the first question instead of blocking on stdin.
///
/// Unattended runs are gated before anything would prompt; this is the
/// backstop for a question slipping through anyway.
#[derive(Debug, Default)]
pub struct NonInteractive;

impl Decider for NonInteractive {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("confirmation needed while running non-interactive: {question}"),
        ))
    }
}

/// Write `question` followed by a `[y/N]` marker, then read one line.
/// Only `y` (any case) confirms; anything else declines.
fn read_confirmation(
    input: &mut impl BufRead,
    output: &mut impl Write,
    question: &str,
) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirm_with(answer: &str) -> (bool, String) {
        let mut input = answer.as_bytes();
        let mut output = Vec::new();
        let confirmed = read_confirmation(&mut input, &mut output, "Port it?").unwrap();
        (confirmed, String::from_utf8(output).unwrap())
    }

    #[test]
    fn lowercase_y_confirms() {
        let (confirmed, _) = confirm_with("y\n");
        assert!(confirmed);
    }

    #[test]
    fn uppercase_y_confirms() {
        let (confirmed, _) = confirm_with("Y\n");
        assert!(confirmed);
    }

    #[test]
    fn n_declines() {
        let (confirmed, _) = confirm_with("n\n");
        assert!(!confirmed);
    }

    #[test]
    fn empty_line_declines() {
        let (confirmed, _) = confirm_with("\n");
        assert!(!confirmed);
    }

    #[test]
    fn spelled_out_yes_declines() {
        // Only the single letter confirms.
        let (confirmed, _) = confirm_with("yes\n");
        assert!(!confirmed);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let (confirmed, _) = confirm_with("  y  \n");
        assert!(confirmed);
    }

    #[test]
    fn prompt_shows_default_marker() {
        let (_, output) = confirm_with("n\n");
        assert_eq!(output, "Port it? [y/N] ");
    }

    #[test]
    fn closed_input_declines() {
        let (confirmed, _) = confirm_with("");
        assert!(!confirmed);
    }

    #[test]
    fn non_interactive_refuses_to_answer() {
        let err = NonInteractive.confirm("Port it?").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(err.to_string().contains("Port it?"));
    }
}
