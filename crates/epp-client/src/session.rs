//! EPP session state machine
//!
//! An [`EppSession`] owns exactly one stream and walks it through
//! `Disconnected -> Connected -> Ready -> Authenticated -> Closed`.
//! Every exchange is one frame out and one frame in; `&mut self` on every
//! operation keeps a second command from being issued while one is
//! outstanding.

use bytes::Bytes;
use epp_core::config::{Credentials, SecureChannelConfig, SessionOptions};
use epp_core::error::ConfigError;
use epp_core::{EppError, ErrorKind, SecureChannel, SessionState, Transport};
use epp_protocol::{
    command, read_frame, write_frame, CommandResult, Greeting, ProtocolError, TransactionId,
    TransactionIdGenerator,
};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Greeting timeout for attached streams when none is configured
pub const DEFAULT_GREETING_TIMEOUT: Duration = Duration::from_secs(15);

/// Error raised by a session operation, tagged with the state the session
/// was in when it happened
#[derive(Error, Debug)]
#[error("{source} (session was {state})")]
pub struct SessionError {
    /// State before the failed operation
    pub state: SessionState,
    /// Underlying error
    #[source]
    pub source: EppError,
}

impl SessionError {
    /// Category of the underlying error
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Discard the state annotation
    pub fn into_inner(self) -> EppError {
        self.source
    }
}

/// One client-to-server EPP conversation
pub struct EppSession<S = SecureChannel> {
    stream: Option<S>,
    state: SessionState,
    greeting: Option<Greeting>,
    trids: TransactionIdGenerator,
    options: SessionOptions,
}

impl EppSession<SecureChannel> {
    /// Open a TLS channel and wait for the server greeting
    ///
    /// The greeting wait defaults to the channel's connect timeout.
    pub async fn connect(
        &mut self,
        config: &SecureChannelConfig,
    ) -> Result<&Greeting, SessionError> {
        self.expect_state(SessionState::Disconnected, "connect")?;

        tracing::info!("Connecting to {}", config.address());
        let channel = match SecureChannel::open(config).await {
            Ok(channel) => channel,
            // Rejected settings never reach the network
            Err(e) if e.kind() == ErrorKind::Config => return Err(self.reject(e)),
            Err(e) => return Err(self.fail(e)),
        };

        let timeout = self
            .options
            .greeting_timeout
            .unwrap_or(config.connect_timeout);
        self.start(channel, timeout).await
    }
}

impl<S: Transport> EppSession<S> {
    /// Create a disconnected session
    pub fn new(options: SessionOptions) -> Self {
        let trids = TransactionIdGenerator::new(options.transaction_prefix.clone());
        Self {
            stream: None,
            state: SessionState::Disconnected,
            greeting: None,
            trids,
            options,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Most recent greeting (from connect or `hello`)
    pub fn greeting(&self) -> Option<&Greeting> {
        self.greeting.as_ref()
    }

    /// Options this session was created with
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Allocate a transaction id for a caller-built command
    pub fn next_transaction_id(&self) -> TransactionId {
        self.trids.next_id()
    }

    /// Run the greeting handshake over an already-open stream
    ///
    /// Used for plain TCP through a local relay tunnel, and for tests.
    pub async fn attach(&mut self, stream: S) -> Result<&Greeting, SessionError> {
        self.expect_state(SessionState::Disconnected, "attach")?;
        let timeout = self
            .options
            .greeting_timeout
            .unwrap_or(DEFAULT_GREETING_TIMEOUT);
        self.start(stream, timeout).await
    }

    async fn start(&mut self, mut stream: S, timeout: Duration) -> Result<&Greeting, SessionError> {
        self.state = SessionState::Connected;

        let received =
            tokio::time::timeout(timeout, read_frame(&mut stream, self.options.max_payload)).await;
        let greeting = match received {
            Ok(Ok(payload)) => parse_greeting(&payload),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(EppError::Protocol(format!(
                "no greeting received within {:?}",
                timeout
            ))),
        };
        let greeting = match greeting.and_then(|g| self.check_server_id(g)) {
            Ok(greeting) => greeting,
            Err(e) => return Err(self.fail(e)),
        };

        tracing::info!(
            server_id = %greeting.server_id,
            server_date = greeting.server_date.as_deref().unwrap_or(""),
            "Received greeting"
        );
        self.stream = Some(stream);
        self.state = SessionState::Ready;
        Ok(&*self.greeting.insert(greeting))
    }

    fn check_server_id(&self, greeting: Greeting) -> Result<Greeting, EppError> {
        match &self.options.expected_server_id {
            Some(expected) if *expected != greeting.server_id => Err(EppError::Protocol(format!(
                "unexpected server id '{}' (expected '{}')",
                greeting.server_id, expected
            ))),
            _ => Ok(greeting),
        }
    }

    /// Log in; on success the session becomes `Authenticated`
    ///
    /// A rejected login is not an error: the result is returned and the
    /// session stays `Ready`.
    pub async fn login(
        &mut self,
        credentials: &Credentials,
    ) -> Result<CommandResult, SessionError> {
        self.expect_state(SessionState::Ready, "login")?;
        let password = credentials.password.as_deref().ok_or_else(|| {
            self.reject(EppError::Config(ConfigError::MissingField(
                "credentials.password".into(),
            )))
        })?;

        let trid = self.trids.next_id();
        let payload = command::login(&credentials.client_id, password, &self.options.login, &trid)
            .map_err(|e| self.reject(e.into()))?;

        tracing::info!(cl_trid = %trid, "Logging in as {}", credentials.client_id);
        let result = self.exchange(payload.as_bytes()).await?;
        if result.is_success() {
            self.state = SessionState::Authenticated;
            tracing::info!("Login accepted ({})", result.code);
        } else {
            tracing::warn!("Login rejected ({}): {}", result.code, result.message);
        }
        Ok(result)
    }

    /// Send a caller-built command and wait for its response
    pub async fn send_command(&mut self, xml: &str) -> Result<CommandResult, SessionError> {
        self.expect_state(SessionState::Authenticated, "send a command")?;
        tracing::debug!("Sending command ({} bytes)", xml.len());
        self.exchange(xml.as_bytes()).await
    }

    /// Query a domain object
    pub async fn domain_info(&mut self, name: &str) -> Result<CommandResult, SessionError> {
        self.expect_state(SessionState::Authenticated, "query a domain")?;
        let trid = self.trids.next_id();
        let payload = command::domain_info(name, &trid).map_err(|e| self.reject(e.into()))?;

        tracing::debug!(cl_trid = %trid, "domain:info {}", name);
        self.exchange(payload.as_bytes()).await
    }

    /// Probe the server with `<hello/>`; the greeting it answers with
    /// replaces the stored one
    pub async fn hello(&mut self) -> Result<&Greeting, SessionError> {
        if self.stream.is_none() || !self.state.is_open() {
            return Err(self.reject(EppError::InvalidState {
                operation: "send hello",
                state: self.state,
            }));
        }
        let payload = command::hello().map_err(|e| self.reject(e.into()))?;

        tracing::debug!("Sending hello");
        let reply = self.round_trip(payload.as_bytes()).await?;
        let greeting = match parse_greeting(&reply) {
            Ok(greeting) => greeting,
            Err(e) => return Err(self.fail(e)),
        };
        Ok(&*self.greeting.insert(greeting))
    }

    /// Log out and close the channel, whatever the result code
    pub async fn logout(&mut self) -> Result<CommandResult, SessionError> {
        self.expect_state(SessionState::Authenticated, "logout")?;
        let trid = self.trids.next_id();
        let payload = command::logout(&trid).map_err(|e| self.reject(e.into()))?;

        tracing::debug!(cl_trid = %trid, "Logging out");
        let result = self.exchange(payload.as_bytes()).await?;
        tracing::info!("Logged out ({})", result.code);
        self.close().await;
        Ok(result)
    }

    /// Close the channel without logging out
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Error shutting down channel: {}", e);
            }
        }
        self.state = SessionState::Closed;
    }

    async fn exchange(&mut self, payload: &[u8]) -> Result<CommandResult, SessionError> {
        let reply = self.round_trip(payload).await?;
        let parsed = std::str::from_utf8(&reply)
            .map_err(ProtocolError::from)
            .and_then(|raw| CommandResult::parse(raw, self.options.result_policy));

        match parsed {
            Ok(result) => {
                tracing::info!(
                    code = %result.code,
                    classification = %result.classification,
                    cl_trid = result.client_transaction_id.as_deref().unwrap_or(""),
                    sv_trid = result.server_transaction_id.as_deref().unwrap_or(""),
                    "{}",
                    result.message
                );
                Ok(result)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    async fn round_trip(&mut self, payload: &[u8]) -> Result<Bytes, SessionError> {
        let state = self.state;
        let max_payload = self.options.max_payload;
        let Some(stream) = self.stream.as_mut() else {
            return Err(SessionError {
                state,
                source: EppError::InvalidState {
                    operation: "exchange frames",
                    state,
                },
            });
        };

        match write_then_read(stream, payload, max_payload).await {
            Ok(reply) => Ok(reply),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.reject(EppError::InvalidState {
                operation,
                state: self.state,
            }))
        }
    }

    /// Error that leaves the session untouched
    fn reject(&self, source: EppError) -> SessionError {
        SessionError {
            state: self.state,
            source,
        }
    }

    /// Error that ends the session
    fn fail(&mut self, source: EppError) -> SessionError {
        let state = self.state;
        tracing::warn!("Session closed in state {}: {}", state, source);
        self.stream = None;
        self.state = SessionState::Closed;
        SessionError { state, source }
    }
}

async fn write_then_read<S: Transport>(
    stream: &mut S,
    payload: &[u8],
    max_payload: usize,
) -> Result<Bytes, ProtocolError> {
    write_frame(stream, payload).await?;
    read_frame(stream, max_payload).await
}

fn parse_greeting(payload: &[u8]) -> Result<Greeting, EppError> {
    let raw = std::str::from_utf8(payload).map_err(ProtocolError::from)?;
    Greeting::parse(raw)?
        .ok_or_else(|| EppError::Protocol("expected a <greeting> from the server".to_string()))
}
