//! Operator input

use dialoguer::Input;
use stagekit::LineReader;
use std::io::{self, BufRead, IsTerminal, Write};

/// Reads answers from the controlling terminal
///
/// With a terminal on both ends the prompt goes through `dialoguer`, which
/// reports Ctrl-C as [`io::ErrorKind::Interrupted`]. Otherwise the prompt is
/// printed and a plain line is read from stdin; end of input is reported as
/// [`io::ErrorKind::UnexpectedEof`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalReader;

impl TerminalReader {
    fn read_interactive(prompt: &str) -> io::Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|err| match err {
                dialoguer::Error::IO(e) => e,
            })
    }

    fn read_plain(prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} ")?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl LineReader for TerminalReader {
    fn read_line(&self, prompt: &str) -> io::Result<String> {
        if console::user_attended() && io::stdin().is_terminal() {
            Self::read_interactive(prompt)
        } else {
            Self::read_plain(prompt)
        }
    }
}
