//! Command payload builders
//!
//! Produces the handful of EPP commands the session layer issues itself.
//! Anything else is sent as caller-supplied XML.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::trid::TransactionId;

/// EPP base namespace
pub const EPP_NS: &str = "urn:ietf:params:xml:ns:epp-1.0";
/// Domain mapping namespace
pub const DOMAIN_NS: &str = "urn:ietf:params:xml:ns:domain-1.0";
/// Contact mapping namespace
pub const CONTACT_NS: &str = "urn:ietf:params:xml:ns:contact-1.0";
/// Host mapping namespace
pub const HOST_NS: &str = "urn:ietf:params:xml:ns:host-1.0";

/// Login parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginOptions {
    /// Protocol version announced in `<options>`
    pub version: String,
    /// Response language announced in `<options>`
    pub lang: String,
    /// Object namespaces requested in `<svcs>`
    pub object_uris: Vec<String>,
    /// Extension namespaces requested in `<svcExtension>`
    pub extension_uris: Vec<String>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            lang: "en".to_string(),
            object_uris: vec![
                DOMAIN_NS.to_string(),
                CONTACT_NS.to_string(),
                HOST_NS.to_string(),
            ],
            extension_uris: vec![],
        }
    }
}

/// `<hello/>` probe (carries no transaction id)
pub fn hello() -> Result<String, ProtocolError> {
    let mut w = EppWriter::new()?;
    w.empty("hello")?;
    w.finish()
}

/// `<login>` command
pub fn login(
    client_id: &str,
    password: &str,
    options: &LoginOptions,
    trid: &TransactionId,
) -> Result<String, ProtocolError> {
    let mut w = EppWriter::new()?;
    w.start("command")?;
    w.start("login")?;
    w.text_element("clID", client_id)?;
    w.text_element("pw", password)?;
    w.start("options")?;
    w.text_element("version", &options.version)?;
    w.text_element("lang", &options.lang)?;
    w.end("options")?;
    w.start("svcs")?;
    for uri in &options.object_uris {
        w.text_element("objURI", uri)?;
    }
    if !options.extension_uris.is_empty() {
        w.start("svcExtension")?;
        for uri in &options.extension_uris {
            w.text_element("extURI", uri)?;
        }
        w.end("svcExtension")?;
    }
    w.end("svcs")?;
    w.end("login")?;
    w.text_element("clTRID", trid.as_str())?;
    w.end("command")?;
    w.finish()
}

/// `<logout/>` command
pub fn logout(trid: &TransactionId) -> Result<String, ProtocolError> {
    let mut w = EppWriter::new()?;
    w.start("command")?;
    w.empty("logout")?;
    w.text_element("clTRID", trid.as_str())?;
    w.end("command")?;
    w.finish()
}

/// `<info>` for a domain object
pub fn domain_info(name: &str, trid: &TransactionId) -> Result<String, ProtocolError> {
    let mut w = EppWriter::new()?;
    w.start("command")?;
    w.start("info")?;
    let mut info = BytesStart::new("domain:info");
    info.push_attribute(("xmlns:domain", DOMAIN_NS));
    w.inner.write_event(Event::Start(info))?;
    w.text_element("domain:name", name)?;
    w.end("domain:info")?;
    w.end("info")?;
    w.text_element("clTRID", trid.as_str())?;
    w.end("command")?;
    w.finish()
}

/// Thin wrapper adding the `<?xml?>` declaration and `<epp>` root
struct EppWriter {
    inner: Writer<Vec<u8>>,
}

impl EppWriter {
    fn new() -> Result<Self, ProtocolError> {
        let mut inner = Writer::new(Vec::with_capacity(512));
        inner.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
        let mut root = BytesStart::new("epp");
        root.push_attribute(("xmlns", EPP_NS));
        inner.write_event(Event::Start(root))?;
        Ok(Self { inner })
    }

    fn start(&mut self, name: &str) -> Result<(), ProtocolError> {
        self.inner.write_event(Event::Start(BytesStart::new(name)))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), ProtocolError> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str) -> Result<(), ProtocolError> {
        self.inner.write_event(Event::Empty(BytesStart::new(name)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), ProtocolError> {
        self.start(name)?;
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(mut self) -> Result<String, ProtocolError> {
        self.end("epp")?;
        String::from_utf8(self.inner.into_inner()).map_err(|e| e.utf8_error().into())
    }
}
