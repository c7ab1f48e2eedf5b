//! CloudEvents HTTP protocol binding.
//!
//! Two modes are supported:
//!
//! - **Binary mode**: context attributes travel as `ce-<name>` headers and the
//!   request body is the event data verbatim. Used for every outbound
//!   publication and accepted inbound.
//! - **Structured mode**: the whole event is one `application/cloudevents+json`
//!   document, with data in `data` (JSON) or `data_base64`. Accepted inbound.
//!
//! The functions here only translate between header pairs / bodies and
//! [`CloudEvent`]; the HTTP client and server types stay in the adapter crates.

use std::collections::BTreeMap;

use base64::Engine;
use serde::Deserialize;

use crate::envelope::{CloudEvent, SPEC_VERSION};
use crate::identifiers::EventId;
use crate::types::{is_valid_attribute_name, ExtensionValue, Extensions, Timestamp};
use crate::EnvelopeError;

/// Prefix of every binary-mode attribute header.
pub const HEADER_PREFIX: &str = "ce-";

/// Media type announcing a structured-mode body.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Header carrying the data media type in binary mode.
pub const CONTENT_TYPE: &str = "content-type";

/// Returns `true` when a request's content type announces structured mode.
pub fn is_structured(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().eq_ignore_ascii_case(STRUCTURED_CONTENT_TYPE))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Binary mode
// ---------------------------------------------------------------------------

/// Encodes the context attributes of `event` as binary-mode headers.
///
/// Extensions become `ce-<name>` headers. The data itself is the request body
/// and is not touched here.
pub fn to_binary_headers(event: &CloudEvent) -> Result<Vec<(String, String)>, EnvelopeError> {
    let mut headers = vec![
        (format!("{HEADER_PREFIX}specversion"), SPEC_VERSION.to_string()),
        (format!("{HEADER_PREFIX}id"), event.id.to_string()),
        (format!("{HEADER_PREFIX}source"), event.source.clone()),
        (format!("{HEADER_PREFIX}type"), event.event_type.clone()),
    ];
    if let Some(subject) = &event.subject {
        headers.push((format!("{HEADER_PREFIX}subject"), subject.clone()));
    }
    if let Some(time) = event.time {
        headers.push((format!("{HEADER_PREFIX}time"), time.to_string()));
    }
    for (name, value) in &event.extensions {
        if !is_valid_attribute_name(name) {
            return Err(EnvelopeError::InvalidExtensionName(name.clone()));
        }
        headers.push((format!("{HEADER_PREFIX}{name}"), value.to_string()));
    }
    if let Some(content_type) = &event.data_content_type {
        headers.push((CONTENT_TYPE.to_string(), content_type.clone()));
    }

    if let Some((name, _)) = headers.iter().find(|(_, v)| !is_header_text(v)) {
        return Err(EnvelopeError::InvalidHeaderValue(name.clone()));
    }
    Ok(headers)
}

/// Decodes a binary-mode request into an envelope.
///
/// Header names are matched case-insensitively; every `ce-*` header that is not
/// a known context attribute becomes a string extension.
pub fn from_binary<'a, I>(headers: I, body: Vec<u8>) -> Result<CloudEvent, EnvelopeError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut attributes = BTreeMap::new();
    let mut content_type = None;
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if name == CONTENT_TYPE {
            content_type = Some(value.to_string());
        } else if let Some(attr) = name.strip_prefix(HEADER_PREFIX) {
            attributes.insert(attr.to_string(), value.to_string());
        }
    }

    let spec_version = attributes
        .remove("specversion")
        .ok_or(EnvelopeError::MissingAttribute("specversion"))?;
    check_spec_version(&spec_version)?;

    let id = attributes
        .remove("id")
        .and_then(EventId::new)
        .ok_or(EnvelopeError::MissingAttribute("id"))?;
    let source = non_empty(attributes.remove("source"))
        .ok_or(EnvelopeError::MissingAttribute("source"))?;
    let event_type = non_empty(attributes.remove("type"))
        .ok_or(EnvelopeError::MissingAttribute("type"))?;
    let subject = attributes.remove("subject");
    let time = attributes.remove("time").map(|t| parse_time(&t)).transpose()?;

    let extensions = attributes
        .into_iter()
        .map(|(name, value)| (name, ExtensionValue::String(value)))
        .collect();

    Ok(CloudEvent {
        id,
        source,
        event_type,
        subject,
        time,
        data_content_type: content_type,
        extensions,
        data: body,
    })
}

// ---------------------------------------------------------------------------
// Structured mode
// ---------------------------------------------------------------------------

/// The JSON document of a structured-mode event.
#[derive(Debug, Deserialize)]
struct StructuredEvent {
    specversion: Option<String>,
    id: Option<String>,
    source: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    subject: Option<String>,
    time: Option<String>,
    datacontenttype: Option<String>,
    data: Option<serde_json::Value>,
    data_base64: Option<String>,
    #[serde(flatten)]
    extensions: Extensions,
}

/// Decodes a structured-mode request body into an envelope.
pub fn from_structured(body: &[u8]) -> Result<CloudEvent, EnvelopeError> {
    let doc: StructuredEvent = serde_json::from_slice(body)?;

    let spec_version = doc
        .specversion
        .ok_or(EnvelopeError::MissingAttribute("specversion"))?;
    check_spec_version(&spec_version)?;

    let id = doc
        .id
        .and_then(EventId::new)
        .ok_or(EnvelopeError::MissingAttribute("id"))?;
    let source = non_empty(doc.source).ok_or(EnvelopeError::MissingAttribute("source"))?;
    let event_type = non_empty(doc.event_type).ok_or(EnvelopeError::MissingAttribute("type"))?;
    let time = doc.time.map(|t| parse_time(&t)).transpose()?;

    if let Some(bad) = doc.extensions.keys().find(|k| !is_valid_attribute_name(k)) {
        return Err(EnvelopeError::InvalidExtensionName(bad.clone()));
    }

    let is_json = doc
        .datacontenttype
        .as_deref()
        .map(|ct| ct.contains("json"))
        .unwrap_or(true);
    let data = match (doc.data_base64, doc.data) {
        (Some(encoded), _) => base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| EnvelopeError::Base64(e.to_string()))?,
        (None, Some(serde_json::Value::String(text))) if !is_json => text.into_bytes(),
        (None, Some(value)) => serde_json::to_vec(&value)?,
        (None, None) => Vec::new(),
    };

    Ok(CloudEvent {
        id,
        source,
        event_type,
        subject: doc.subject,
        time,
        data_content_type: doc.datacontenttype,
        extensions: doc.extensions,
        data,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_spec_version(version: &str) -> Result<(), EnvelopeError> {
    if version == SPEC_VERSION {
        Ok(())
    } else {
        Err(EnvelopeError::UnsupportedSpecVersion(version.to_string()))
    }
}

fn parse_time(value: &str) -> Result<Timestamp, EnvelopeError> {
    Timestamp::parse_rfc3339(value).ok_or_else(|| EnvelopeError::InvalidTime(value.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn is_header_text(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b))
}
