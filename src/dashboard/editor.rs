//! Line-command editor for the strategy form.
//!
//! Each input line is one command addressing strategies by id and selectors
//! by index. Blank lines and lines starting with `#` are ignored, so the
//! same parser drives interactive sessions and script files.

use std::io::{BufRead, Write};

use anyhow::Result;
use thiserror::Error;

use super::{ActionResult, Dashboard, render};
use crate::strategy::{FormError, StrategyId};

pub const HELP: &str = "\
Commands:
  add                                   append a default strategy
  remove <id>                           remove a strategy
  clear                                 reset to a single default strategy
  priority <id> on|off                  set the priority flag
  exec <id> <ns>                        set the execution time in nanoseconds
  pid <id> [pid]                        set (or clear) the target PID
  regex <id> [pattern]                  set (or clear) the command regex
  selector add <id>                     append a blank selector
  selector rm <id> <index>              remove a selector
  selector set <id> <index> <key> <value>
                                        fill in a selector
  show                                  print the form
  preview                               print the request body
  submit                                save all strategies
  help                                  print this help
  quit                                  leave the editor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add,
    Remove(StrategyId),
    Clear,
    Priority(StrategyId, bool),
    Exec(StrategyId, String),
    Pid(StrategyId, String),
    Regex(StrategyId, String),
    SelectorAdd(StrategyId),
    SelectorRemove(StrategyId, usize),
    SelectorSet {
        id: StrategyId,
        index: usize,
        key: String,
        value: String,
    },
    Show,
    Preview,
    Submit,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a strategy id")]
    BadId(String),
    #[error("'{0}' is not a selector index")]
    BadIndex(String),
}

/// Split off the first whitespace-delimited word.
fn take_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], input[end..].trim()),
        None => (input, ""),
    }
}

fn parse_id(raw: &str, usage: &'static str) -> Result<StrategyId, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Usage(usage));
    }
    raw.parse().map_err(|_| ParseError::BadId(raw.to_string()))
}

fn parse_index(raw: &str, usage: &'static str) -> Result<usize, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Usage(usage));
    }
    raw.parse().map_err(|_| ParseError::BadIndex(raw.to_string()))
}

/// Parse one line. `Ok(None)` for blank and comment lines.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = take_word(line);
    let command = match verb {
        "add" => Command::Add,
        "remove" | "rm" => Command::Remove(parse_id(rest, "remove <id>")?),
        "clear" => Command::Clear,
        "priority" => {
            const USAGE: &str = "priority <id> on|off";
            let (id, flag) = take_word(rest);
            let id = parse_id(id, USAGE)?;
            match flag {
                "on" | "true" | "yes" | "1" => Command::Priority(id, true),
                "off" | "false" | "no" | "0" => Command::Priority(id, false),
                _ => return Err(ParseError::Usage(USAGE)),
            }
        }
        "exec" => {
            let (id, value) = take_word(rest);
            Command::Exec(parse_id(id, "exec <id> <ns>")?, value.to_string())
        }
        "pid" => {
            let (id, value) = take_word(rest);
            Command::Pid(parse_id(id, "pid <id> [pid]")?, value.to_string())
        }
        "regex" => {
            let (id, value) = take_word(rest);
            Command::Regex(parse_id(id, "regex <id> [pattern]")?, value.to_string())
        }
        "selector" | "sel" => parse_selector(rest)?,
        "show" | "ls" => Command::Show,
        "preview" => Command::Preview,
        "submit" | "save" => Command::Submit,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_selector(rest: &str) -> Result<Command, ParseError> {
    const SET_USAGE: &str = "selector set <id> <index> <key> <value>";
    let (action, rest) = take_word(rest);
    match action {
        "add" => Ok(Command::SelectorAdd(parse_id(rest, "selector add <id>")?)),
        "rm" | "remove" => {
            const USAGE: &str = "selector rm <id> <index>";
            let (id, index) = take_word(rest);
            Ok(Command::SelectorRemove(
                parse_id(id, USAGE)?,
                parse_index(index, USAGE)?,
            ))
        }
        "set" => {
            let (id, rest) = take_word(rest);
            let (index, rest) = take_word(rest);
            let (key, value) = take_word(rest);
            Ok(Command::SelectorSet {
                id: parse_id(id, SET_USAGE)?,
                index: parse_index(index, SET_USAGE)?,
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        _ => Err(ParseError::Usage("selector add|rm|set ...")),
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// What the editor shows after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Result(ActionResult),
    Quit,
}

fn edited(outcome: Result<(), FormError>, message: String) -> Reply {
    Reply::Result(match outcome {
        Ok(()) => ActionResult::success(message),
        Err(e) => ActionResult::error(e.to_string()),
    })
}

pub fn execute(dashboard: &mut Dashboard, command: Command) -> Reply {
    let form = dashboard.form_mut();
    match command {
        Command::Add => {
            let id = form.add_strategy();
            Reply::Result(ActionResult::success(format!("Strategy #{id} added")))
        }
        Command::Remove(id) => {
            if form.remove_strategy(id) {
                Reply::Result(ActionResult::success(format!("Strategy #{id} removed")))
            } else {
                Reply::Result(ActionResult::error(FormError::UnknownStrategy(id).to_string()))
            }
        }
        Command::Clear => Reply::Result(dashboard.clear_strategies()),
        Command::Priority(id, on) => edited(
            form.set_priority(id, on),
            format!("Strategy #{id} priority {}", if on { "on" } else { "off" }),
        ),
        Command::Exec(id, value) => edited(
            form.set_execution_time(id, &value),
            format!("Strategy #{id} execution time set"),
        ),
        Command::Pid(id, value) => edited(form.set_pid(id, &value), format!("Strategy #{id} PID set")),
        Command::Regex(id, value) => edited(
            form.set_command_regex(id, &value),
            format!("Strategy #{id} command regex set"),
        ),
        Command::SelectorAdd(id) => Reply::Result(match form.add_selector(id) {
            Ok(index) => ActionResult::success(format!("Strategy #{id} selector [{index}] added")),
            Err(e) => ActionResult::error(e.to_string()),
        }),
        Command::SelectorRemove(id, index) => edited(
            form.remove_selector(id, index),
            format!("Strategy #{id} selector [{index}] removed"),
        ),
        Command::SelectorSet {
            id,
            index,
            key,
            value,
        } => edited(
            form.set_selector(id, index, &key, &value),
            format!("Strategy #{id} selector [{index}] set"),
        ),
        Command::Show => Reply::Text(render::form(form)),
        Command::Preview => Reply::Text(render::preview(&form.serialize())),
        Command::Submit => Reply::Result(dashboard.submit_strategies()),
        Command::Help => Reply::Text(HELP.to_string()),
        Command::Quit => Reply::Quit,
    }
}

/// Drive the editor from `input` until EOF or `quit`.
///
/// With `prompt` set, a prompt is written before each line is read.
pub fn run(
    dashboard: &mut Dashboard,
    input: impl BufRead,
    output: &mut impl Write,
    prompt: bool,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        if prompt {
            write!(output, "form> ")?;
            output.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let reply = match parse(&line?) {
            Ok(Some(command)) => execute(dashboard, command),
            Ok(None) => continue,
            Err(e) => Reply::Result(ActionResult::error(e.to_string())),
        };
        match reply {
            Reply::Text(text) => writeln!(output, "{}", text.trim_end())?,
            Reply::Result(result) => writeln!(output, "{}", render::result(&result))?,
            Reply::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> StrategyId {
        StrategyId::new(n)
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(parse("# set up ran pods"), Ok(None));
    }

    #[test]
    fn parses_field_commands() {
        assert_eq!(parse("add"), Ok(Some(Command::Add)));
        assert_eq!(parse("priority 2 on"), Ok(Some(Command::Priority(id(2), true))));
        assert_eq!(
            parse("exec #1 5000000"),
            Ok(Some(Command::Exec(id(1), "5000000".to_string())))
        );
        assert_eq!(parse("pid 1"), Ok(Some(Command::Pid(id(1), String::new()))));
        assert_eq!(
            parse("regex 1 nr-gnb  --cfg x"),
            Ok(Some(Command::Regex(id(1), "nr-gnb  --cfg x".to_string())))
        );
    }

    #[test]
    fn parses_selector_commands() {
        assert_eq!(
            parse("selector set 1 0 app ran-du"),
            Ok(Some(Command::SelectorSet {
                id: id(1),
                index: 0,
                key: "app".to_string(),
                value: "ran-du".to_string(),
            }))
        );
        assert_eq!(
            parse("selector rm 3 1"),
            Ok(Some(Command::SelectorRemove(id(3), 1)))
        );
        assert_eq!(
            parse("selector rm 3"),
            Err(ParseError::Usage("selector rm <id> <index>"))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse("launch"), Err(ParseError::Unknown("launch".to_string())));
        assert_eq!(parse("remove x"), Err(ParseError::BadId("x".to_string())));
        assert_eq!(
            parse("priority 1 maybe"),
            Err(ParseError::Usage("priority <id> on|off"))
        );
        assert_eq!(
            parse("selector set 1 z app ran"),
            Err(ParseError::BadIndex("z".to_string()))
        );
    }
}
