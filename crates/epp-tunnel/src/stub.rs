//! Minimal plaintext EPP server for staging and tests
//!
//! Sends a greeting on connect and answers every command with a fixed
//! result code, echoing the client transaction id.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use epp_protocol::command::{CONTACT_NS, DOMAIN_NS, EPP_NS, HOST_NS};
use epp_protocol::{FrameCodec, ProtocolError, ResultCode};
use futures::{SinkExt, StreamExt};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Stub server behaviour
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// `<svID>` in the greeting
    pub server_id: String,
    /// Code returned for `<login>`
    pub login_code: ResultCode,
    /// Code returned for every other command except `<logout>`
    pub command_code: ResultCode,
    /// Close the connection right after the greeting
    pub close_after_greeting: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            server_id: "TEST EPP Server".to_string(),
            login_code: ResultCode::SUCCESS,
            command_code: ResultCode::SUCCESS,
            close_after_greeting: false,
        }
    }
}

/// What a client frame asks for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Hello,
    Login,
    Logout,
    Other,
}

/// Stub EPP server
pub struct StubServer {
    config: Arc<StubConfig>,
    cancel: CancellationToken,
}

impl StubServer {
    pub fn new(config: StubConfig, cancel: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            cancel,
        }
    }

    /// Bind `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Serve on an existing listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!("Stub EPP server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Stub EPP server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let config = Arc::clone(&self.config);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tracing::debug!("Stub client connected from {}", peer_addr);
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = converse(socket, &config) => result,
            };
            match result {
                Ok(()) => tracing::debug!("Stub client {} done", peer_addr),
                Err(e) => tracing::warn!("Stub client {} failed: {}", peer_addr, e),
            }
        });
    }
}

async fn converse(socket: TcpStream, config: &StubConfig) -> Result<(), ProtocolError> {
    let mut framed = Framed::new(socket, FrameCodec::new());
    framed.send(Bytes::from(greeting(&config.server_id))).await?;
    if config.close_after_greeting {
        return Ok(());
    }

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let text = std::str::from_utf8(&frame)?;
        let (request, cl_trid) = inspect(text)?;
        tracing::debug!("Stub received {:?} ({:?})", request, cl_trid);

        let reply = match request {
            Request::Hello => greeting(&config.server_id),
            Request::Login => response(
                config.login_code,
                "Command completed successfully",
                cl_trid.as_deref(),
            ),
            Request::Logout => {
                let bye = response(
                    ResultCode::SUCCESS_ENDING_SESSION,
                    "Command completed successfully; ending session",
                    cl_trid.as_deref(),
                );
                framed.send(Bytes::from(bye)).await?;
                break;
            }
            Request::Other => {
                response(config.command_code, "Command completed", cl_trid.as_deref())
            }
        };
        framed.send(Bytes::from(reply)).await?;
    }

    Ok(())
}

/// Classify a client frame and pull out its `<clTRID>`
fn inspect(xml: &str) -> Result<(Request, Option<String>), ProtocolError> {
    let mut reader = Reader::from_str(xml);
    let mut request = Request::Other;
    let mut cl_trid = None;
    let mut in_trid = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"hello" => request = Request::Hello,
                b"login" => request = Request::Login,
                b"logout" => request = Request::Logout,
                b"clTRID" => in_trid = true,
                _ => {}
            },
            Event::Text(t) if in_trid => {
                cl_trid = Some(t.unescape()?.trim().to_string());
                in_trid = false;
            }
            Event::End(_) => in_trid = false,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((request, cl_trid))
}

fn greeting(server_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="{EPP_NS}"><greeting><svID>{}</svID><svcMenu><version>1.0</version><lang>en</lang><objURI>{DOMAIN_NS}</objURI><objURI>{CONTACT_NS}</objURI><objURI>{HOST_NS}</objURI></svcMenu></greeting></epp>"#,
        escape(server_id)
    )
}

fn response(code: ResultCode, message: &str, cl_trid: Option<&str>) -> String {
    let cl_trid = cl_trid
        .map(|t| format!("<clTRID>{}</clTRID>", escape(t)))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="{EPP_NS}"><response><result code="{code}"><msg>{}</msg></result><trID>{cl_trid}<svTRID>STUB-{code}</svTRID></trID></response></epp>"#,
        escape(message)
    )
}
