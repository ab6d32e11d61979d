// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use super::*;

fn parse_ok(args: &[&str]) -> Invocation {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    parse(&args).unwrap()
}

fn parse_err(args: &[&str]) -> String {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    parse(&args).unwrap_err()
}

#[test]
fn no_arguments_means_help() {
    assert_eq!(parse_ok(&[]).command, Command::Help);
}

#[test]
fn parses_simple_subcommands() {
    assert_eq!(parse_ok(&["serve"]).command, Command::Serve);
    assert_eq!(parse_ok(&["stop"]).command, Command::Stop);
    assert_eq!(parse_ok(&["status"]).command, Command::Status);
    assert_eq!(parse_ok(&["version"]).command, Command::Version);
}

#[test]
fn parses_tool_subcommands() {
    assert_eq!(
        parse_ok(&["register", "w1"]).command,
        Command::Register {
            name: "w1".to_string()
        }
    );
    assert_eq!(
        parse_ok(&["ack", "w1", "b-1"]).command,
        Command::Ack {
            worker: "w1".to_string(),
            bead: "b-1".to_string()
        }
    );
    assert_eq!(
        parse_ok(&["submit", "b-1"]).command,
        Command::Submit {
            bead: "b-1".to_string()
        }
    );
    assert_eq!(
        parse_ok(&["done", "b-1"]).command,
        Command::Done {
            bead: "b-1".to_string()
        }
    );
    assert_eq!(
        parse_ok(&["reset", "w1"]).command,
        Command::Reset {
            worker: "w1".to_string()
        }
    );
    assert_eq!(
        parse_ok(&["retry", "b-1"]).command,
        Command::Retry {
            bead: "b-1".to_string()
        }
    );
}

#[test]
fn poll_timeout_is_optional() {
    assert_eq!(
        parse_ok(&["poll", "w1"]).command,
        Command::Poll {
            name: "w1".to_string(),
            timeout_ms: None
        }
    );
    assert_eq!(
        parse_ok(&["poll", "w1", "1500"]).command,
        Command::Poll {
            name: "w1".to_string(),
            timeout_ms: Some(1500)
        }
    );
    assert!(parse_err(&["poll", "w1", "soon"]).contains("invalid timeout_ms"));
}

#[test]
fn fail_joins_the_reason_words() {
    assert_eq!(
        parse_ok(&["fail", "b-1", "tests", "are", "red"]).command,
        Command::Fail {
            bead: "b-1".to_string(),
            reason: "tests are red".to_string()
        }
    );
    assert!(parse_err(&["fail", "b-1"]).contains("usage: fail"));
}

#[test]
fn project_flag_is_accepted_anywhere() {
    let inv = parse_ok(&["--project", "/srv/x", "status"]);
    assert_eq!(inv.project_root.as_deref(), Some(Path::new("/srv/x")));
    assert_eq!(inv.command, Command::Status);

    let inv = parse_ok(&["status", "--project", "/srv/x"]);
    assert_eq!(inv.project_root.as_deref(), Some(Path::new("/srv/x")));
    assert_eq!(inv.command, Command::Status);
}

#[test]
fn rejects_unknown_commands_and_extra_args() {
    assert!(parse_err(&["frobnicate"]).contains("unknown command"));
    assert!(parse_err(&["status", "extra"]).contains("unexpected argument"));
    assert!(parse_err(&["--project"]).contains("requires a path"));
}
