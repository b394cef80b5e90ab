//! Interactive confirmation protocol
//!
//! Callers check their auto-confirm flag before calling [`confirm`]; this
//! module only asks. What a decline or an interrupt means is up to the
//! call site.

use crate::context::{LineReader, Translate};
use std::io;

/// Accepted affirmative answers, English and Russian
pub const AFFIRMATIVE: &[&str] = &["y", "yes", "д", "да"];

/// Operator's reply to a yes/no prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Ctrl-C or end of input while waiting for the answer
    Interrupted,
}

impl Answer {
    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

/// Check a raw answer against [`AFFIRMATIVE`] (trimmed, case-folded)
pub fn is_affirmative(input: &str) -> bool {
    let answer = input.trim().to_lowercase();
    AFFIRMATIVE.contains(&answer.as_str())
}

/// Render the localized prompt, read one line and classify it
pub fn confirm(reader: &dyn LineReader, i18n: &dyn Translate, prompt_key: &str) -> Answer {
    let prompt = i18n.t(prompt_key, &[]);

    match reader.read_line(&prompt) {
        Ok(line) if is_affirmative(&line) => Answer::Yes,
        Ok(_) => Answer::No,
        Err(e) if is_interrupt(&e) => Answer::Interrupted,
        // Any other read failure counts as a decline
        Err(_) => Answer::No,
    }
}

fn is_interrupt(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{KeyTranslator, ScriptedReader};

    #[test]
    fn test_affirmative_set() {
        for yes in ["y", "Y", "yes", " YES ", "д", "Д", "да", "ДА", "Да\n"] {
            assert!(is_affirmative(yes), "{yes:?}");
        }
        for no in ["", "n", "no", "нет", "yep", "y e s", "1"] {
            assert!(!is_affirmative(no), "{no:?}");
        }
    }

    #[test]
    fn test_confirm_yes_and_no() {
        let reader = ScriptedReader::new(["да", "nope"]);
        assert_eq!(confirm(&reader, &KeyTranslator, "q"), Answer::Yes);
        assert_eq!(confirm(&reader, &KeyTranslator, "q"), Answer::No);
    }

    #[test]
    fn test_confirm_shows_translated_prompt() {
        let reader = ScriptedReader::new(["y"]);
        confirm(&reader, &KeyTranslator, "install.prompt");
        assert_eq!(reader.prompts(), vec!["install.prompt".to_string()]);
    }

    #[test]
    fn test_confirm_interrupt() {
        let reader = ScriptedReader::interrupted();
        assert_eq!(confirm(&reader, &KeyTranslator, "q"), Answer::Interrupted);
    }

    #[test]
    fn test_confirm_eof_is_interrupt() {
        // Script exhausted behaves like a closed stdin
        let reader = ScriptedReader::new(Vec::<&str>::new());
        assert_eq!(confirm(&reader, &KeyTranslator, "q"), Answer::Interrupted);
    }
}
