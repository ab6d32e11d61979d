// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-rolled argument parsing for the `beadbus` CLI.

use std::path::PathBuf;

/// A parsed CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Project root override (`--project <path>`); defaults to cwd.
    pub project_root: Option<PathBuf>,
    pub command: Command,
}

/// CLI subcommands. One per daemon tool, plus lifecycle helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Stop,
    Status,
    Register { name: String },
    Poll { name: String, timeout_ms: Option<u64> },
    Ack { worker: String, bead: String },
    Submit { bead: String },
    Done { bead: String },
    Fail { bead: String, reason: String },
    Reset { worker: String },
    Retry { bead: String },
    Help,
    Version,
}

pub fn parse(args: &[String]) -> Result<Invocation, String> {
    let mut project_root = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--project" => match iter.next() {
                Some(path) => project_root = Some(PathBuf::from(path)),
                None => return Err("--project requires a path".to_string()),
            },
            "--help" | "-h" => {
                return Ok(Invocation {
                    project_root,
                    command: Command::Help,
                })
            }
            "--version" | "-V" => {
                return Ok(Invocation {
                    project_root,
                    command: Command::Version,
                })
            }
            _ => rest.push(arg.clone()),
        }
    }

    let Some((name, tail)) = rest.split_first() else {
        return Ok(Invocation {
            project_root,
            command: Command::Help,
        });
    };

    let command = match name.as_str() {
        "serve" => no_args(tail, Command::Serve)?,
        "stop" => no_args(tail, Command::Stop)?,
        "status" => no_args(tail, Command::Status)?,
        "help" => no_args(tail, Command::Help)?,
        "version" => no_args(tail, Command::Version)?,
        "register" => Command::Register {
            name: one_arg(tail, "register <name>")?,
        },
        "poll" => match tail {
            [name] => Command::Poll {
                name: name.clone(),
                timeout_ms: None,
            },
            [name, timeout] => Command::Poll {
                name: name.clone(),
                timeout_ms: Some(
                    timeout
                        .parse()
                        .map_err(|_| format!("invalid timeout_ms: {timeout}"))?,
                ),
            },
            _ => return Err("usage: poll <name> [timeout_ms]".to_string()),
        },
        "ack" => {
            let (worker, bead) = two_args(tail, "ack <worker> <bead>")?;
            Command::Ack { worker, bead }
        }
        "submit" => Command::Submit {
            bead: one_arg(tail, "submit <bead>")?,
        },
        "done" => Command::Done {
            bead: one_arg(tail, "done <bead>")?,
        },
        "fail" => match tail {
            [] | [_] => return Err("usage: fail <bead> <reason...>".to_string()),
            [bead, reason @ ..] => Command::Fail {
                bead: bead.clone(),
                reason: reason.join(" "),
            },
        },
        "reset" => Command::Reset {
            worker: one_arg(tail, "reset <worker>")?,
        },
        "retry" => Command::Retry {
            bead: one_arg(tail, "retry <bead>")?,
        },
        other => return Err(format!("unknown command '{other}'")),
    };

    Ok(Invocation {
        project_root,
        command,
    })
}

fn no_args(tail: &[String], command: Command) -> Result<Command, String> {
    if tail.is_empty() {
        Ok(command)
    } else {
        Err(format!("unexpected argument '{}'", tail[0]))
    }
}

fn one_arg(tail: &[String], usage: &str) -> Result<String, String> {
    match tail {
        [value] => Ok(value.clone()),
        _ => Err(format!("usage: {usage}")),
    }
}

fn two_args(tail: &[String], usage: &str) -> Result<(String, String), String> {
    match tail {
        [a, b] => Ok((a.clone(), b.clone())),
        _ => Err(format!("usage: {usage}")),
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
