//! Line commands read from stdin.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use shared::domain::{EntityId, EntityKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Entity { kind: EntityKind, action: EntityAction },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityAction {
    Set { field: String, value: String },
    Image { path: PathBuf },
    Commit,
    Edit { id: EntityId },
    Delete { id: EntityId },
    Cancel,
    List,
    Show,
}

pub const USAGE: &str = "\
commands:
  <kind> set <field> <value>   change one draft field
  <kind> image <path>          load a picture into the draft's image field
  <kind> commit                save the draft
  <kind> edit <id>             load a saved entity into the draft
  <kind> delete <id>           remove a saved entity
  <kind> cancel                discard the draft
  <kind> list                  print saved entities
  <kind> show                  print the draft
  help | quit
kinds: driver, race, team";

/// Blank lines and `#` comments parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (head, rest) = next_word(line);
    match head.to_ascii_lowercase().as_str() {
        "quit" | "exit" => return Ok(Some(Command::Quit)),
        "help" | "?" => return Ok(Some(Command::Help)),
        _ => {}
    }

    let kind: EntityKind = head.parse()?;
    let (verb, rest) = next_word(rest);
    let action = match verb.to_ascii_lowercase().as_str() {
        "set" => {
            let (field, value) = next_word(rest);
            if field.is_empty() {
                bail!("usage: {kind} set <field> <value>");
            }
            EntityAction::Set {
                field: field.to_string(),
                value: value.to_string(),
            }
        }
        "image" => {
            if rest.is_empty() {
                bail!("usage: {kind} image <path>");
            }
            EntityAction::Image {
                path: PathBuf::from(rest),
            }
        }
        "commit" | "save" => EntityAction::Commit,
        "edit" => EntityAction::Edit {
            id: parse_id(kind, "edit", rest)?,
        },
        "delete" => EntityAction::Delete {
            id: parse_id(kind, "delete", rest)?,
        },
        "cancel" => EntityAction::Cancel,
        "list" => EntityAction::List,
        "show" => EntityAction::Show,
        "" => bail!("missing action for {kind}"),
        other => bail!("unknown action '{other}' for {kind}"),
    };

    Ok(Some(Command::Entity { kind, action }))
}

fn next_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn parse_id(kind: EntityKind, verb: &str, raw: &str) -> Result<EntityId> {
    if raw.is_empty() {
        return Err(anyhow!("usage: {kind} {verb} <id>"));
    }
    let id = raw
        .parse::<i64>()
        .with_context(|| format!("'{raw}' is not a valid {kind} id"))?;
    Ok(EntityId(id))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
