//! Operator confirmation capability.
//!
//! Selected once at startup; business logic only ever asks `confirm`.
//! Non-interactive deployments must resolve to [`ConfirmationPolicy::DenyAll`]
//! so a disabled automation flag means "skip", never "block".

use std::io::{BufRead, Write};

use crate::config::ReconcilerConfig;

pub enum ConfirmationPolicy {
    AutoApprove,
    DenyAll,
    Interactive(Box<dyn Fn(&str) -> bool>),
}

impl ConfirmationPolicy {
    /// Policy for a run: interactive prompts only when the deployer asked
    /// for manual mode and stdin is a terminal.
    pub fn for_run(config: &ReconcilerConfig, interactive: bool) -> Self {
        if config.manual_enrolment_mode && interactive {
            ConfirmationPolicy::Interactive(Box::new(|question| {
                ask_stdin_question(question, &mut std::io::stdin().lock(), &mut std::io::stdout())
            }))
        } else {
            ConfirmationPolicy::DenyAll
        }
    }

    pub fn confirm(&self, question: &str) -> bool {
        match self {
            ConfirmationPolicy::AutoApprove => true,
            ConfirmationPolicy::DenyAll => false,
            ConfirmationPolicy::Interactive(prompt) => prompt(question),
        }
    }
}

impl std::fmt::Debug for ConfirmationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConfirmationPolicy::AutoApprove => "AutoApprove",
            ConfirmationPolicy::DenyAll => "DenyAll",
            ConfirmationPolicy::Interactive(_) => "Interactive",
        };
        f.write_str(label)
    }
}

/// Ask a y/n question on the given streams, re-asking until the answer is
/// one of the two. EOF counts as "n".
pub fn ask_stdin_question(
    question: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> bool {
    loop {
        let _ = write!(output, "\n{question} [y/n] ");
        let _ = output.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match line.trim().to_lowercase().as_str() {
            "y" => return true,
            "n" => return false,
            _ => {}
        }
    }
}
