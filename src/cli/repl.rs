//! # REPL
//!
//! The interactive loop: read a line with rustyline, dispatch it to the
//! command handler, print the result. Command errors are displayed but do
//! not terminate the loop; `.quit` and Ctrl+D do.

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::cli::commands::{CommandHandler, CommandResult};
use crate::cli::history::history_path;
use crate::Db;

const PROMPT: &str = "slotdb> ";

pub struct Repl {
    db: Db,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(db: Db) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;

        if let Some(history_file) = history_path() {
            let _ = editor.load_history(&history_file);
        }

        Ok(Self { db, editor })
    }

    pub fn run(&mut self) -> Result<()> {
        println!("slotdb {} at {}", env!("CARGO_PKG_VERSION"), self.db.path().display());
        println!("Type .help for available commands.");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(&line);

                    match CommandHandler::execute(&line, &self.db) {
                        CommandResult::Output(text) => println!("{}", text),
                        CommandResult::Error(text) => eprintln!("error: {}", text),
                        CommandResult::Continue => {}
                        CommandResult::Exit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => println!("^C"),
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("error reading input: {}", err);
                    break;
                }
            }
        }

        if let Some(history_file) = history_path() {
            let _ = self.editor.save_history(&history_file);
        }
        Ok(())
    }
}
