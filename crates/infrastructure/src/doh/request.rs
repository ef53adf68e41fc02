//! RFC 8484 request classification
//!
//! Decides from the request head alone whether a DoH request is served, and
//! with which HTTP status it is refused otherwise. POST bodies are read by the
//! handler; GET queries are decoded here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http::{header, Method, Request, StatusCode};

/// Request path served by the frontend (RFC 8484 §4.1 example URI template)
pub const DOH_PATH: &str = "/dns-query";

/// Media type of DoH request and response bodies (RFC 8484 §6)
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Accepted request, before the DNS payload itself is validated
#[derive(Debug, PartialEq, Eq)]
pub enum DohQuery {
    /// GET with the message carried in the `dns` query parameter
    Get(Vec<u8>),
    /// POST whose body is the message
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    MethodNotAllowed,
    UnsupportedMediaType,
    PayloadTooLarge,
    BadRequest(String),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Rejection::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Rejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

pub fn classify(request: &Request<()>, body_limit: usize) -> Result<DohQuery, Rejection> {
    if request.uri().path() != DOH_PATH {
        return Err(Rejection::NotFound);
    }

    match *request.method() {
        Method::GET => decode_get(request.uri().query(), body_limit).map(DohQuery::Get),
        Method::POST => {
            if has_dns_message_content_type(request) {
                Ok(DohQuery::Post)
            } else {
                Err(Rejection::UnsupportedMediaType)
            }
        }
        _ => Err(Rejection::MethodNotAllowed),
    }
}

fn decode_get(query: Option<&str>, body_limit: usize) -> Result<Vec<u8>, Rejection> {
    let encoded = query
        .unwrap_or_default()
        .split('&')
        .find_map(|pair| pair.strip_prefix("dns="))
        .ok_or_else(|| Rejection::BadRequest("missing dns parameter".to_string()))?;

    // Padding is not allowed by RFC 8484 §4.1 but some clients send it anyway
    let encoded = encoded.trim_end_matches('=');

    // Four base64 characters carry three bytes
    if encoded.len() / 4 * 3 > body_limit {
        return Err(Rejection::PayloadTooLarge);
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| Rejection::BadRequest(format!("invalid base64url: {}", e)))?;

    if decoded.len() > body_limit {
        return Err(Rejection::PayloadTooLarge);
    }

    Ok(decoded)
}

fn has_dns_message_content_type(request: &Request<()>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case(DNS_MESSAGE_CONTENT_TYPE))
        .unwrap_or(false)
}
