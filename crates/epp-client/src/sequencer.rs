//! Login, operations, logout
//!
//! The sequencer is the seam shared by scripted runs and the interactive
//! shell. It owns one [`EppSession`] for its whole life.

use epp_core::config::{Credentials, SecureChannelConfig, SessionOptions};
use epp_core::{EppError, SecureChannel, SessionState, Transport};
use epp_protocol::{CommandResult, Greeting};
use serde::Serialize;

use crate::session::{EppSession, SessionError};

/// One step between login and logout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `<domain:info>` for the given name
    DomainInfo(String),
    /// Caller-built command XML, sent as is
    Custom(String),
    /// `<hello/>` probe
    Hello,
}

/// Result of one [`Operation`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Command(CommandResult),
    Greeting(Greeting),
}

impl StepOutcome {
    /// Greetings always count as success
    pub fn is_success(&self) -> bool {
        match self {
            StepOutcome::Command(result) => result.is_success(),
            StepOutcome::Greeting(_) => true,
        }
    }
}

/// Everything a sequence produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceReport {
    /// Greeting received on connect
    pub greeting: Option<Greeting>,
    /// Login response
    pub login: Option<CommandResult>,
    /// One entry per operation actually run
    pub outcomes: Vec<StepOutcome>,
    /// Logout response, if logout was reached
    pub logout: Option<CommandResult>,
    /// An operation failed and the remaining ones were skipped
    pub stopped_early: bool,
}

impl SequenceReport {
    /// Whether every step succeeded
    pub fn is_success(&self) -> bool {
        !self.stopped_early && self.outcomes.iter().all(StepOutcome::is_success)
    }
}

/// Drives one session through `connect -> login -> operations -> logout`
pub struct CommandSequencer<S = SecureChannel> {
    session: EppSession<S>,
    report: SequenceReport,
}

impl CommandSequencer<SecureChannel> {
    /// Open a TLS channel, read the greeting and log in
    pub async fn connect(
        config: &SecureChannelConfig,
        options: SessionOptions,
        credentials: &Credentials,
    ) -> Result<Self, SessionError> {
        let mut session = EppSession::<SecureChannel>::new(options);
        session.connect(config).await?;
        Self::login(session, credentials).await
    }
}

impl<S: Transport> CommandSequencer<S> {
    /// Read the greeting from an open stream and log in
    pub async fn start(
        stream: S,
        options: SessionOptions,
        credentials: &Credentials,
    ) -> Result<Self, SessionError> {
        let mut session = EppSession::<S>::new(options);
        session.attach(stream).await?;
        Self::login(session, credentials).await
    }

    async fn login(
        mut session: EppSession<S>,
        credentials: &Credentials,
    ) -> Result<Self, SessionError> {
        let greeting = session.greeting().cloned();
        let result = session.login(credentials).await?;

        if !result.is_success() {
            session.close().await;
            return Err(SessionError {
                state: SessionState::Ready,
                source: EppError::CommandRejected {
                    code: result.code,
                    message: result.message,
                },
            });
        }

        Ok(Self {
            session,
            report: SequenceReport {
                greeting,
                login: Some(result),
                ..Default::default()
            },
        })
    }

    /// Session being driven
    pub fn session(&self) -> &EppSession<S> {
        &self.session
    }

    /// Report so far
    pub fn report(&self) -> &SequenceReport {
        &self.report
    }

    /// Run one operation
    ///
    /// Error-classified responses are returned as outcomes; only transport
    /// and protocol failures are errors, and those leave the session closed.
    pub async fn run(&mut self, operation: &Operation) -> Result<&StepOutcome, SessionError> {
        let outcome = match operation {
            Operation::DomainInfo(name) => {
                StepOutcome::Command(self.session.domain_info(name).await?)
            }
            Operation::Custom(xml) => {
                StepOutcome::Command(self.session.send_command(xml).await?)
            }
            Operation::Hello => StepOutcome::Greeting(self.session.hello().await?.clone()),
        };

        self.report.outcomes.push(outcome);
        let last = self.report.outcomes.len() - 1;
        Ok(&self.report.outcomes[last])
    }

    /// Log out (if still logged in) and hand back the report
    pub async fn finish(mut self) -> Result<SequenceReport, SessionError> {
        if self.session.state() == SessionState::Authenticated {
            self.report.logout = Some(self.session.logout().await?);
        }
        Ok(self.report)
    }

    /// Hang up without logging out
    pub async fn abandon(mut self) -> SequenceReport {
        tracing::info!("Closing session without logout");
        self.session.close().await;
        self.report
    }

    /// Run `operations` in order, stopping at the first error-classified
    /// response, then log out
    pub async fn run_script(
        mut self,
        operations: &[Operation],
    ) -> Result<SequenceReport, SessionError> {
        for operation in operations {
            if !self.run(operation).await?.is_success() {
                tracing::warn!("Operation {:?} failed, skipping the rest", operation);
                self.report.stopped_early = true;
                break;
            }
        }
        self.finish().await
    }
}
