//! One-shot session commands: info, send, hello, probe

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use epp_client::{CommandSequencer, EppSession, Operation, SequenceReport, StepOutcome};
use epp_core::config::SessionOptions;
use epp_core::{SecureChannel, Transport};
use epp_protocol::Greeting;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::output::{
    format_channel, format_greeting, format_report, print_json, print_success, ChannelSummary,
    OutputOptions,
};
use crate::settings::{Route, Settings};

/// Look up one or more domains
pub async fn info_command(
    settings: &Settings,
    domains: &[String],
    out: OutputOptions,
) -> Result<()> {
    let operations: Vec<Operation> = domains
        .iter()
        .cloned()
        .map(Operation::DomainInfo)
        .collect();
    let report = run_sequence(settings, &operations).await?;
    show_report(&report, out)
}

/// Send command XML read from files, one command per file
pub async fn send_command(
    settings: &Settings,
    files: &[PathBuf],
    out: OutputOptions,
) -> Result<()> {
    let mut operations = Vec::with_capacity(files.len());
    for path in files {
        let xml = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read command file {:?}", path))?;
        operations.push(Operation::Custom(xml));
    }
    let report = run_sequence(settings, &operations).await?;
    show_report(&report, out)
}

/// Send `<hello/>` without logging in
pub async fn hello_command(settings: &Settings, out: OutputOptions) -> Result<()> {
    let options = session_options(settings);
    let greeting = match &settings.route {
        Route::Direct => {
            let mut session = EppSession::<SecureChannel>::new(options);
            session
                .connect(&settings.config.server)
                .await
                .with_context(|| format!("Failed to connect to {}", settings.destination()))?;
            hello_and_close(&mut session).await?
        }
        Route::Via(addr) => {
            let stream = connect_via(settings, addr).await?;
            let mut session = EppSession::<TcpStream>::new(options);
            session
                .attach(stream)
                .await
                .with_context(|| format!("No greeting from {}", settings.destination()))?;
            hello_and_close(&mut session).await?
        }
    };

    if out.json {
        print_json(&greeting)
    } else {
        println!("{}", format_greeting(&greeting));
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    channel: Option<ChannelSummary>,
    greeting: Greeting,
}

/// Open the channel, show what was negotiated and the greeting, then hang up
pub async fn probe_command(settings: &Settings, out: OutputOptions) -> Result<()> {
    let options = session_options(settings);
    let report = match &settings.route {
        Route::Direct => {
            let channel = SecureChannel::open(&settings.config.server)
                .await
                .with_context(|| {
                    format!("Failed to open secure channel to {}", settings.destination())
                })?;
            let summary = ChannelSummary {
                destination: channel.server().to_string(),
                protocol: channel.protocol_version().to_string(),
                cipher: channel.cipher().unwrap_or("-").to_string(),
            };
            let mut session = EppSession::<SecureChannel>::new(options);
            ProbeReport {
                channel: Some(summary),
                greeting: greet_and_close(&mut session, channel).await?,
            }
        }
        Route::Via(addr) => {
            let stream = connect_via(settings, addr).await?;
            let mut session = EppSession::<TcpStream>::new(options);
            ProbeReport {
                channel: None,
                greeting: greet_and_close(&mut session, stream).await?,
            }
        }
    };

    if out.json {
        return print_json(&report);
    }

    print_success(&format!("Connected to {}", settings.destination()));
    if let Some(channel) = &report.channel {
        println!("{}", format_channel(channel));
    }
    println!("{}", format_greeting(&report.greeting));
    Ok(())
}

/// Log in, run `operations`, log out
pub async fn run_sequence(
    settings: &Settings,
    operations: &[Operation],
) -> Result<SequenceReport> {
    let config = &settings.config;
    let options = session_options(settings);
    let report = match &settings.route {
        Route::Direct => {
            CommandSequencer::connect(&config.server, options, &config.credentials)
                .await
                .with_context(|| format!("Failed to log in to {}", settings.destination()))?
                .run_script(operations)
                .await?
        }
        Route::Via(addr) => {
            let stream = connect_via(settings, addr).await?;
            CommandSequencer::start(stream, options, &config.credentials)
                .await
                .with_context(|| format!("Failed to log in to {}", settings.destination()))?
                .run_script(operations)
                .await?
        }
    };
    Ok(report)
}

/// Plain TCP connection to a local relay tunnel
pub async fn connect_via(settings: &Settings, addr: &str) -> Result<TcpStream> {
    let timeout = settings.config.server.connect_timeout;
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| anyhow!("Timed out connecting to tunnel at {}", addr))?
        .with_context(|| format!("Failed to connect to tunnel at {}", addr))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Session options with the greeting wait tied to the connect timeout
pub(crate) fn session_options(settings: &Settings) -> SessionOptions {
    let mut options = settings.config.session.clone();
    options
        .greeting_timeout
        .get_or_insert(settings.config.server.connect_timeout);
    options
}

async fn hello_and_close<S: Transport>(session: &mut EppSession<S>) -> Result<Greeting> {
    let greeting = session.hello().await.context("hello failed")?.clone();
    session.close().await;
    Ok(greeting)
}

async fn greet_and_close<S: Transport>(
    session: &mut EppSession<S>,
    stream: S,
) -> Result<Greeting> {
    let greeting = session
        .attach(stream)
        .await
        .context("No greeting received")?
        .clone();
    session.close().await;
    Ok(greeting)
}

fn show_report(report: &SequenceReport, out: OutputOptions) -> Result<()> {
    if out.json {
        print_json(report)?;
    } else {
        println!("{}", format_report(report));
        if out.raw {
            for outcome in &report.outcomes {
                if let StepOutcome::Command(result) = outcome {
                    println!("{}", result.raw_response);
                }
            }
        }
    }

    if !report.is_success() {
        return Err(anyhow!("One or more commands failed"));
    }
    Ok(())
}
