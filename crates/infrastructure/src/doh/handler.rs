use super::request::{classify, DohQuery, Rejection, DNS_MESSAGE_CONTENT_TYPE};
use crate::dns::message::DnsMessage;
use bytes::{Buf, Bytes};
use ferrous_doh_application::use_cases::ForwardQueryUseCase;
use ferrous_doh_domain::DomainError;
use h3::server::RequestStream;
use http::{header, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

pub type DohStream = RequestStream<h3_quinn::BidiStream<Bytes>, Bytes>;

/// Serves one DoH exchange per HTTP/3 request stream.
pub struct DohHandler {
    use_case: Arc<ForwardQueryUseCase>,
}

impl DohHandler {
    pub fn new(use_case: Arc<ForwardQueryUseCase>) -> Self {
        Self { use_case }
    }

    /// Answer `request` on `stream` and finish the stream.
    ///
    /// `body_limit` is the request-size bound negotiated with the connection.
    /// Errors are stream-level only: the caller logs them and the connection
    /// carries on.
    pub async fn handle(
        &self,
        request: Request<()>,
        mut stream: DohStream,
        body_limit: usize,
    ) -> Result<(), DomainError> {
        let query = match classify(&request, body_limit) {
            Ok(DohQuery::Get(query)) => query,
            Ok(DohQuery::Post) => match read_body(&mut stream, body_limit).await? {
                Some(body) => body,
                None => return reject(&mut stream, Rejection::PayloadTooLarge).await,
            },
            Err(rejection) => {
                debug!(
                    method = %request.method(),
                    path = request.uri().path(),
                    status = rejection.status().as_u16(),
                    "DoH request refused"
                );
                return reject(&mut stream, rejection).await;
            }
        };

        let message = match DnsMessage::validate_query(&query) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "DoH payload is not a DNS query");
                return reject(&mut stream, Rejection::BadRequest(e.to_string())).await;
            }
        };

        let answer = match self.use_case.execute(&query).await {
            Ok(answer) => answer,
            Err(e) if e.is_backend_failure() => DnsMessage::servfail(&query, &message)?,
            Err(e) => return Err(e),
        };

        respond(&mut stream, answer).await
    }
}

/// Collect a POST body; `None` once it grows past `limit`.
async fn read_body(stream: &mut DohStream, limit: usize) -> Result<Option<Vec<u8>>, DomainError> {
    let mut body = Vec::new();

    while let Some(mut chunk) = stream.recv_data().await.map_err(stream_error)? {
        while chunk.has_remaining() {
            let bytes = chunk.chunk();
            body.extend_from_slice(bytes);
            let len = bytes.len();
            chunk.advance(len);
        }
        if body.len() > limit {
            warn!(limit, received = body.len(), "DoH request body over limit");
            return Ok(None);
        }
    }

    Ok(Some(body))
}

async fn respond(stream: &mut DohStream, answer: Vec<u8>) -> Result<(), DomainError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, answer.len());

    // RFC 8484 §5.1: freshness follows the smallest TTL in the answer
    if let Some(ttl) = DnsMessage::min_answer_ttl(&answer) {
        builder = builder.header(header::CACHE_CONTROL, format!("max-age={}", ttl));
    }

    let response = builder.body(()).map_err(response_error)?;

    stream.send_response(response).await.map_err(stream_error)?;
    stream
        .send_data(Bytes::from(answer))
        .await
        .map_err(stream_error)?;
    stream.finish().await.map_err(stream_error)
}

async fn reject(stream: &mut DohStream, rejection: Rejection) -> Result<(), DomainError> {
    let response = Response::builder()
        .status(rejection.status())
        .body(())
        .map_err(response_error)?;

    stream.send_response(response).await.map_err(stream_error)?;
    stream.finish().await.map_err(stream_error)
}

fn stream_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::Protocol(format!("HTTP/3 stream error: {}", e))
}

fn response_error(e: http::Error) -> DomainError {
    DomainError::Protocol(format!("Invalid HTTP response: {}", e))
}
