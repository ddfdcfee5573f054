use crate::error::InstallerError;
use dialoguer::theme::ColorfulTheme;
use std::io::{self, BufRead, IsTerminal, Write};

/// Yes/no gate in front of destructive operations.
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool, InstallerError>;
}

/// Interactive prompt on a terminal, a plain `[y/N]` line read otherwise.
/// End of input counts as "no".
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, question: &str) -> Result<bool, InstallerError> {
        if io::stdin().is_terminal() && io::stderr().is_terminal() {
            let answer = dialoguer::Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .default(false)
                .interact_opt()?;
            return Ok(answer.unwrap_or(false));
        }
        eprint!("{question} [y/N] ");
        io::stderr().flush()?;
        read_answer(&mut io::stdin().lock())
    }
}

pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _question: &str) -> Result<bool, InstallerError> {
        Ok(true)
    }
}

pub fn read_answer<R: BufRead>(reader: &mut R) -> Result<bool, InstallerError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(false);
    }
    Ok(is_affirmative(&line))
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn only_y_and_yes_are_affirmative() {
        for answer in ["y", "Y", "yes", " YES \n"] {
            assert!(is_affirmative(answer), "{answer:?}");
        }
        for answer in ["", "\n", "n", "no", "yep", "sure"] {
            assert!(!is_affirmative(answer), "{answer:?}");
        }
    }

    #[test]
    fn eof_reads_as_no() {
        assert!(!read_answer(&mut Cursor::new("")).unwrap());
        assert!(!read_answer(&mut Cursor::new("\n")).unwrap());
        assert!(read_answer(&mut Cursor::new("yes\nno\n")).unwrap());
    }

    #[test]
    fn assume_yes_always_confirms() {
        assert!(AssumeYes.confirm("Remove everything?").unwrap());
    }
}
