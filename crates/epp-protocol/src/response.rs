//! Response and greeting interpretation
//!
//! Only the handful of elements the transport needs are extracted: the
//! `<result code>` and its `<msg>`, the transaction ids, and the greeting's
//! service menu. Element names are matched by local name so that both the
//! default namespace and prefixed forms (`<epp:result>`) are understood.

use std::fmt;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Four-digit EPP result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub u16);

impl ResultCode {
    /// Command completed successfully
    pub const SUCCESS: ResultCode = ResultCode(1000);
    /// Command completed successfully; ending session
    pub const SUCCESS_ENDING_SESSION: ResultCode = ResultCode(1500);

    /// Get the raw code value
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Leading decimal digit of the code
    pub fn leading_digit(&self) -> u8 {
        let mut n = self.0;
        while n >= 10 {
            n /= 10;
        }
        n as u8
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for ResultCode {
    type Err = ProtocolError;

    /// Accepts exactly the four-digit range `1000..=9999`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<u16>() {
            Ok(code) if (1000..=9999).contains(&code) => Ok(ResultCode(code)),
            _ => Err(ProtocolError::InvalidResultCode(trimmed.to_string())),
        }
    }
}

/// Outcome class of a result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Success,
    SuccessWithInfo,
    Error,
}

impl Classification {
    /// Whether the command should be treated as accepted
    pub fn is_success(&self) -> bool {
        !matches!(self, Classification::Error)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Success => "success",
            Classification::SuccessWithInfo => "success (with info)",
            Classification::Error => "error",
        };
        f.write_str(s)
    }
}

/// Mapping from result codes to classifications
///
/// `LeadingDigit` is this toolkit's convention: a leading `1` is success, a
/// leading `2` is success with further information, anything else is an
/// error. `Rfc5730` follows the registry protocol itself, where every 2xxx
/// code is a failed command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultPolicy {
    #[default]
    LeadingDigit,
    Rfc5730,
}

impl ResultPolicy {
    /// Classify a result code under this policy
    pub fn classify(&self, code: ResultCode) -> Classification {
        match (self, code.leading_digit()) {
            (_, 1) => Classification::Success,
            (ResultPolicy::LeadingDigit, 2) => Classification::SuccessWithInfo,
            _ => Classification::Error,
        }
    }
}

impl FromStr for ResultPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "leading-digit" | "leading_digit" | "digit" => Ok(ResultPolicy::LeadingDigit),
            "rfc5730" | "strict" => Ok(ResultPolicy::Rfc5730),
            _ => Err(format!("unknown result policy {s}")),
        }
    }
}

/// Classify a result code with the default leading-digit policy
pub fn classify(code: ResultCode) -> Classification {
    ResultPolicy::LeadingDigit.classify(code)
}

/// Outcome of one command/response exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Result code of the first `<result>` element
    pub code: ResultCode,
    /// Human-readable `<msg>` text (empty if absent)
    pub message: String,
    /// Classification of `code`
    pub classification: Classification,
    /// `<clTRID>` echoed by the server
    pub client_transaction_id: Option<String>,
    /// `<svTRID>` assigned by the server
    pub server_transaction_id: Option<String>,
    /// Complete response payload
    pub raw_response: String,
}

impl CommandResult {
    /// Parse a response payload and classify its result code
    pub fn parse(raw: &str, policy: ResultPolicy) -> Result<Self, ProtocolError> {
        let mut reader = Reader::from_str(raw);

        let mut code = None;
        let mut message = None;
        let mut cl_trid = None;
        let mut sv_trid = None;
        let mut current: Option<Field> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    current = None;
                    match e.local_name().as_ref() {
                        b"result" if code.is_none() => code = Some(result_code(&e)?),
                        b"msg" if code.is_some() && message.is_none() => {
                            current = Some(Field::Message)
                        }
                        b"clTRID" => current = Some(Field::ClientTrid),
                        b"svTRID" => current = Some(Field::ServerTrid),
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"result" && code.is_none() {
                        code = Some(result_code(&e)?);
                    }
                }
                Event::Text(t) => {
                    if let Some(field) = current {
                        let text = t.unescape()?.trim().to_string();
                        match field {
                            Field::Message => message = Some(text),
                            Field::ClientTrid => cl_trid = Some(text),
                            Field::ServerTrid => sv_trid = Some(text),
                        }
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }

        let code = code.ok_or(ProtocolError::MissingResult)?;
        Ok(Self {
            code,
            message: message.unwrap_or_default(),
            classification: policy.classify(code),
            client_transaction_id: cl_trid,
            server_transaction_id: sv_trid,
            raw_response: raw.to_string(),
        })
    }

    /// Whether the command was accepted
    pub fn is_success(&self) -> bool {
        self.classification.is_success()
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Message,
    ClientTrid,
    ServerTrid,
}

fn result_code(element: &BytesStart<'_>) -> Result<ResultCode, ProtocolError> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == b"code" {
            return std::str::from_utf8(&attr.value)?.parse();
        }
    }
    Err(ProtocolError::InvalidResultCode(String::new()))
}

/// Server greeting, sent unsolicited after connect and in reply to `<hello>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    /// `<svID>` server name
    pub server_id: String,
    /// `<svDate>` server clock
    pub server_date: Option<String>,
    /// Protocol versions offered
    pub versions: Vec<String>,
    /// Languages offered
    pub languages: Vec<String>,
    /// Object namespaces offered
    pub object_uris: Vec<String>,
    /// Extension namespaces offered
    pub extension_uris: Vec<String>,
    /// Complete greeting payload
    pub raw: String,
}

impl Greeting {
    /// Parse a greeting payload
    ///
    /// Returns `None` when the payload is well-formed XML but carries no
    /// `<greeting>` element.
    pub fn parse(raw: &str) -> Result<Option<Self>, ProtocolError> {
        let mut reader = Reader::from_str(raw);
        let mut greeting: Option<Greeting> = None;
        let mut current: Option<&'static str> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = e.local_name();
                    current = match name.as_ref() {
                        b"greeting" => {
                            greeting = Some(Greeting {
                                raw: raw.to_string(),
                                ..Default::default()
                            });
                            None
                        }
                        b"svID" => Some("svID"),
                        b"svDate" => Some("svDate"),
                        b"version" => Some("version"),
                        b"lang" => Some("lang"),
                        b"objURI" => Some("objURI"),
                        b"extURI" => Some("extURI"),
                        _ => None,
                    };
                }
                Event::Text(t) => {
                    if let (Some(field), Some(g)) = (current, greeting.as_mut()) {
                        let text = t.unescape()?.trim().to_string();
                        match field {
                            "svID" => g.server_id = text,
                            "svDate" => g.server_date = Some(text),
                            "version" => g.versions.push(text),
                            "lang" => g.languages.push(text),
                            "objURI" => g.object_uris.push(text),
                            "extURI" => g.extension_uris.push(text),
                            _ => {}
                        }
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(greeting)
    }
}
