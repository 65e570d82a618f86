//! # Dot Command Handler
//!
//! Parses and executes the REPL's dot commands. Arguments are
//! whitespace-separated; the last argument of `.set` and `.setdata`
//! swallows the rest of the line so values can contain spaces.

use crate::{Db, Error, Pattern};

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Output(String),
    Exit,
    Continue,
    Error(String),
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn execute(input: &str, db: &Db) -> CommandResult {
        let input = input.trim();
        let parts: Vec<&str> = input.split_whitespace().collect();

        let Some(&cmd) = parts.first() else {
            return CommandResult::Continue;
        };
        let args = &parts[1..];

        match cmd.to_lowercase().as_str() {
            ".quit" | ".exit" | ".q" => CommandResult::Exit,
            ".help" | ".h" | ".?" => CommandResult::Output(help_text()),
            ".tables" => list_tables(db),
            ".rows" => list_rows(db, args),
            ".get" => get_row(db, args),
            ".set" => set_row(db, args, input),
            ".del" => del(db, args),
            ".data" => show_data(db, args),
            ".setdata" => set_data(db, args, input),
            ".deldata" => del_data(db, args),
            ".find" => find_rows(db, args),
            ".optimize" => optimize(db),
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type .help for available commands.",
                cmd
            )),
        }
    }
}

fn help_text() -> String {
    r#"slotdb commands:

  .tables                  List all tables
  .rows TABLE              List the rows of TABLE
  .get TABLE KEY           Print one row's value
  .set TABLE KEY VALUE     Insert or update a row
  .del TABLE [KEY]         Delete a row, or the whole table
  .find TABLE REGEX        List rows whose key matches REGEX
  .data [KEY]              List global entries, or print one
  .setdata KEY VALUE       Insert or update a global entry
  .deldata KEY             Delete a global entry
  .optimize                Compact the database file
  .help                    Show this help message
  .quit                    Exit

Use Ctrl+D or .quit to exit."#
        .to_string()
}

fn list_tables(db: &Db) -> CommandResult {
    match db.find_tables(&Pattern::any()) {
        Ok(tables) if tables.is_empty() => CommandResult::Output("No tables.".into()),
        Ok(tables) => {
            let mut names: Vec<String> = tables
                .iter()
                .map(|t| format!("{} ({} rows)", t.name(), t.row_count()))
                .collect();
            names.sort();
            CommandResult::Output(names.join("\n"))
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn list_rows(db: &Db, args: &[&str]) -> CommandResult {
    let Some(name) = args.first() else {
        return CommandResult::Error("usage: .rows TABLE".into());
    };

    let table = match db.get_table(name) {
        Ok(t) => t,
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    match table.find_rows(&Pattern::any(), &Pattern::any()) {
        Ok(rows) if rows.is_empty() => CommandResult::Output("No rows.".into()),
        Ok(rows) => CommandResult::Output(
            rows.iter()
                .map(|r| format!("{} = {}", r.key(), r.value()))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn get_row(db: &Db, args: &[&str]) -> CommandResult {
    let [name, key] = args else {
        return CommandResult::Error("usage: .get TABLE KEY".into());
    };

    match db.get_table(name).and_then(|t| t.get_row(key)) {
        Ok(row) => CommandResult::Output(row.value()),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn set_row(db: &Db, args: &[&str], input: &str) -> CommandResult {
    let [name, key, ..] = args else {
        return CommandResult::Error("usage: .set TABLE KEY VALUE".into());
    };
    let Some(value) = rest_after(input, 3) else {
        return CommandResult::Error("usage: .set TABLE KEY VALUE".into());
    };

    let mut table = match db.get_table(name) {
        Ok(t) => t,
        Err(Error::NotFound) => match db.add_table(name) {
            Ok(t) => t,
            Err(e) => return CommandResult::Error(e.to_string()),
        },
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    match table.add_row(key, &value) {
        Ok(_) => CommandResult::Output("ok".into()),
        Err(Error::RowExists(mut row)) => match row.set_value(&value) {
            Ok(()) => CommandResult::Output("ok (updated)".into()),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn del(db: &Db, args: &[&str]) -> CommandResult {
    match args {
        [name] => match db.get_table(name) {
            Ok(mut table) => match table.del() {
                Ok(()) => CommandResult::Output("table deleted".into()),
                Err(e) => CommandResult::Error(e.to_string()),
            },
            Err(e) => CommandResult::Error(e.to_string()),
        },
        [name, key] => match db.get_table(name).and_then(|t| t.get_row(key)) {
            Ok(mut row) => match row.del() {
                Ok(()) => CommandResult::Output("row deleted".into()),
                Err(e) => CommandResult::Error(e.to_string()),
            },
            Err(e) => CommandResult::Error(e.to_string()),
        },
        _ => CommandResult::Error("usage: .del TABLE [KEY]".into()),
    }
}

fn show_data(db: &Db, args: &[&str]) -> CommandResult {
    match args.first() {
        Some(key) => match db.get_data(key) {
            Ok(data) => CommandResult::Output(data.value()),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        None => match db.find_data(&Pattern::any(), &Pattern::any()) {
            Ok(entries) if entries.is_empty() => CommandResult::Output("No data.".into()),
            Ok(entries) => CommandResult::Output(
                entries
                    .iter()
                    .map(|d| format!("{} = {}", d.key(), d.value()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(e) => CommandResult::Error(e.to_string()),
        },
    }
}

fn set_data(db: &Db, args: &[&str], input: &str) -> CommandResult {
    let [key, ..] = args else {
        return CommandResult::Error("usage: .setdata KEY VALUE".into());
    };
    let Some(value) = rest_after(input, 2) else {
        return CommandResult::Error("usage: .setdata KEY VALUE".into());
    };

    match db.add_data(key, &value) {
        Ok(_) => CommandResult::Output("ok".into()),
        Err(Error::DataExists(mut data)) => match data.set_value(&value) {
            Ok(()) => CommandResult::Output("ok (updated)".into()),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn del_data(db: &Db, args: &[&str]) -> CommandResult {
    let [key] = args else {
        return CommandResult::Error("usage: .deldata KEY".into());
    };

    match db.get_data(key) {
        Ok(mut data) => match data.del() {
            Ok(()) => CommandResult::Output("deleted".into()),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn find_rows(db: &Db, args: &[&str]) -> CommandResult {
    let [name, pattern] = args else {
        return CommandResult::Error("usage: .find TABLE REGEX".into());
    };

    let key_pattern = match Pattern::regex(pattern.as_bytes()) {
        Ok(p) => p,
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    match db
        .get_table(name)
        .and_then(|t| t.find_rows(&key_pattern, &Pattern::any()))
    {
        Ok(rows) if rows.is_empty() => CommandResult::Output("No matches.".into()),
        Ok(rows) => CommandResult::Output(
            rows.iter()
                .map(|r| format!("{} = {}", r.key(), r.value()))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn optimize(db: &Db) -> CommandResult {
    match db.optimize() {
        Ok(()) => CommandResult::Output("compacted".into()),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Everything after the first `n` whitespace-separated fields, trimmed.
fn rest_after(input: &str, n: usize) -> Option<String> {
    let mut remainder = input.trim_start();
    for _ in 0..n {
        let split = remainder.find(char::is_whitespace)?;
        remainder = remainder[split..].trim_start();
    }
    if remainder.is_empty() {
        None
    } else {
        Some(remainder.to_string())
    }
}
