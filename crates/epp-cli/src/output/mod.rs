//! Output formatting utilities for the CLI
//!
//! Tables for greetings and command results, JSON output for scripting,
//! and colored status messages.

use anyhow::Result;
use epp_client::{SequenceReport, StepOutcome};
use epp_protocol::{Classification, CommandResult, Greeting};
use serde::Serialize;
use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

/// How command output is rendered
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Machine-readable JSON instead of tables
    pub json: bool,
    /// Also print the raw response XML
    pub raw: bool,
}

/// Negotiated channel parameters shown by `probe`
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub destination: String,
    pub protocol: String,
    pub cipher: String,
}

/// Format a server greeting as a two-column table
pub fn format_greeting(greeting: &Greeting) -> String {
    #[derive(Tabled)]
    struct Field {
        #[tabled(rename = "FIELD")]
        name: &'static str,
        #[tabled(rename = "VALUE")]
        value: String,
    }

    let rows = vec![
        Field {
            name: "Server",
            value: greeting.server_id.clone(),
        },
        Field {
            name: "Date",
            value: greeting.server_date.clone().unwrap_or_else(|| "-".to_string()),
        },
        Field {
            name: "Versions",
            value: join_or_dash(&greeting.versions),
        },
        Field {
            name: "Languages",
            value: join_or_dash(&greeting.languages),
        },
        Field {
            name: "Objects",
            value: join_or_dash(&greeting.object_uris),
        },
        Field {
            name: "Extensions",
            value: join_or_dash(&greeting.extension_uris),
        },
    ];

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format command results as a table, one row per result
pub fn format_results<'a>(
    results: impl IntoIterator<Item = (&'a str, &'a CommandResult)>,
) -> String {
    #[derive(Tabled)]
    struct ResultRow {
        #[tabled(rename = "STEP")]
        step: String,
        #[tabled(rename = "CODE")]
        code: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "MESSAGE")]
        message: String,
        #[tabled(rename = "CLTRID")]
        client_trid: String,
        #[tabled(rename = "SVTRID")]
        server_trid: String,
    }

    let rows: Vec<ResultRow> = results
        .into_iter()
        .map(|(step, r)| ResultRow {
            step: step.to_string(),
            code: r.code.to_string(),
            status: r.classification.to_string(),
            message: r.message.clone(),
            client_trid: r.client_transaction_id.clone().unwrap_or_else(|| "-".to_string()),
            server_trid: r.server_transaction_id.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    if rows.is_empty() {
        return "No commands sent".to_string();
    }

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(120))
        .to_string()
}

/// Format a whole sequence: login, each operation and logout
pub fn format_report(report: &SequenceReport) -> String {
    let mut results: Vec<(&str, &CommandResult)> = Vec::new();
    let mut greetings = Vec::new();

    if let Some(login) = &report.login {
        results.push(("login", login));
    }
    for outcome in &report.outcomes {
        match outcome {
            StepOutcome::Command(result) => results.push(("command", result)),
            StepOutcome::Greeting(greeting) => greetings.push(greeting),
        }
    }
    if let Some(logout) = &report.logout {
        results.push(("logout", logout));
    }

    let mut output = format_results(results);
    for greeting in greetings {
        output.push('\n');
        output.push_str(&format_greeting(greeting));
    }
    if report.stopped_early {
        output.push_str("\nStopped after the first failed command");
    }
    output
}

/// Format negotiated channel parameters
pub fn format_channel(summary: &ChannelSummary) -> String {
    format!(
        "Destination: {}\nProtocol: {}\nCipher: {}",
        summary.destination, summary.protocol, summary.cipher
    )
}

/// Print any serializable value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a single result line, colored by classification
pub fn print_result(result: &CommandResult) {
    let line = format!("{} {}", result.code, result.message);
    match result.classification {
        Classification::Success => print_success(&line),
        Classification::SuccessWithInfo => print_warning(&line),
        Classification::Error => print_error(&line),
    }
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join("\n")
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use epp_protocol::{ResultCode, ResultPolicy};

    const GREETING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><greeting><svID>Example Registry</svID><svDate>2024-01-01T00:00:00Z</svDate><svcMenu><version>1.0</version><lang>en</lang><objURI>urn:ietf:params:xml:ns:domain-1.0</objURI></svcMenu></greeting></epp>"#;

    fn result(code: u16) -> CommandResult {
        let xml = format!(
            r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><response><result code="{code}"><msg>Done</msg></result><trID><clTRID>CLI-1</clTRID><svTRID>SV-1</svTRID></trID></response></epp>"#
        );
        CommandResult::parse(&xml, ResultPolicy::default()).unwrap()
    }

    #[test]
    fn test_format_greeting() {
        let greeting = Greeting::parse(GREETING).unwrap().unwrap();
        let table = format_greeting(&greeting);
        assert!(table.contains("Example Registry"));
        assert!(table.contains("2024-01-01T00:00:00Z"));
        assert!(table.contains("urn:ietf:params:xml:ns:domain-1.0"));
    }

    #[test]
    fn test_format_results() {
        let login = result(1000);
        let info = result(2303);
        let table = format_results([("login", &login), ("command", &info)]);
        assert!(table.contains("1000"));
        assert!(table.contains("2303"));
        assert!(table.contains("CLI-1"));

        assert_eq!(format_results(std::iter::empty()), "No commands sent");
    }

    #[test]
    fn test_format_report_marks_early_stop() {
        let report = SequenceReport {
            login: Some(result(1000)),
            outcomes: vec![StepOutcome::Command(result(2303))],
            logout: Some(result(1500)),
            stopped_early: true,
            ..Default::default()
        };
        let text = format_report(&report);
        assert!(text.contains("1500"));
        assert!(text.contains("Stopped after the first failed command"));
        assert_eq!(ResultCode(1500), report.logout.unwrap().code);
    }
}
