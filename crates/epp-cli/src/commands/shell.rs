//! Interactive session
//!
//! Logs in once, then reads one command per line from stdin. `logout` and
//! end of input log out before leaving; `quit` hangs up without logging out.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use epp_client::{CommandSequencer, Operation, StepOutcome};
use epp_core::Transport;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::session::{connect_via, session_options};
use crate::output::{
    format_greeting, print_error, print_info, print_json, print_result, OutputOptions,
};
use crate::settings::{Route, Settings};

const HELP: &str =
    "Commands: info <domain>, send <file>, xml <command>, hello, help, logout, quit";

/// One line of shell input
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Empty,
    Help,
    Logout,
    Quit,
    Run(Operation),
    Send(PathBuf),
}

/// Start an interactive session
pub async fn shell_command(settings: &Settings, out: OutputOptions) -> Result<()> {
    let config = &settings.config;
    let options = session_options(settings);
    match &settings.route {
        Route::Direct => {
            let sequencer = CommandSequencer::connect(&config.server, options, &config.credentials)
                .await
                .with_context(|| format!("Failed to log in to {}", settings.destination()))?;
            run_shell(sequencer, out).await
        }
        Route::Via(addr) => {
            let stream = connect_via(settings, addr).await?;
            let sequencer = CommandSequencer::start(stream, options, &config.credentials)
                .await
                .with_context(|| format!("Failed to log in to {}", settings.destination()))?;
            run_shell(sequencer, out).await
        }
    }
}

async fn run_shell<S: Transport>(
    mut sequencer: CommandSequencer<S>,
    out: OutputOptions,
) -> Result<()> {
    if let Some(login) = &sequencer.report().login {
        print_result(login);
    }
    print_info(HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let operation = match parse_input(&line) {
            Ok(Input::Empty) => continue,
            Ok(Input::Help) => {
                print_info(HELP);
                continue;
            }
            Ok(Input::Logout) => break,
            Ok(Input::Quit) => {
                sequencer.abandon().await;
                print_info("Disconnected without logout");
                return Ok(());
            }
            Ok(Input::Run(operation)) => operation,
            Ok(Input::Send(path)) => match tokio::fs::read_to_string(&path).await {
                Ok(xml) => Operation::Custom(xml),
                Err(e) => {
                    print_error(&format!("Failed to read {:?}: {}", path, e));
                    continue;
                }
            },
            Err(message) => {
                print_error(&message);
                continue;
            }
        };

        // Transport failures close the session, so they end the shell
        let outcome = sequencer.run(&operation).await?;
        show_outcome(outcome, out)?;
    }

    let report = sequencer.finish().await?;
    if let Some(logout) = &report.logout {
        print_result(logout);
    }
    Ok(())
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("xml") {
        if rest.is_empty() || rest.starts_with([':', ' ', '\t']) {
            let xml = rest.trim_start_matches(':').trim();
            if xml.is_empty() {
                return Err("'xml' needs a command document".to_string());
            }
            return Ok(Input::Run(Operation::Custom(xml.to_string())));
        }
    }

    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Input::Empty);
    };
    let argument = words.next();
    if words.next().is_some() {
        return Err(format!("Too many arguments to '{}'", command));
    }

    match (command, argument) {
        ("help" | "?", None) => Ok(Input::Help),
        ("logout", None) => Ok(Input::Logout),
        ("quit" | "exit", None) => Ok(Input::Quit),
        ("hello", None) => Ok(Input::Run(Operation::Hello)),
        ("info", Some(domain)) => Ok(Input::Run(Operation::DomainInfo(domain.to_string()))),
        ("send", Some(path)) => Ok(Input::Send(PathBuf::from(path))),
        ("info" | "send", None) => Err(format!("'{}' needs an argument", command)),
        _ => Err(format!("Unknown command '{}'. {}", command, HELP)),
    }
}

fn show_outcome(outcome: &StepOutcome, out: OutputOptions) -> Result<()> {
    if out.json {
        return print_json(outcome);
    }
    match outcome {
        StepOutcome::Command(result) => {
            print_result(result);
            if out.raw {
                println!("{}", result.raw_response);
            }
        }
        StepOutcome::Greeting(greeting) => println!("{}", format_greeting(greeting)),
    }
    Ok(())
}

fn prompt() {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "epp> ");
    let _ = stdout.flush();
}
