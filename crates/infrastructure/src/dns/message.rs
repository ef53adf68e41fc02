//! DNS wire-format helpers
//!
//! Validation of incoming DoH payloads, SERVFAIL synthesis for backend
//! failures, and the header peeks the forwarder needs. Parsing and encoding go
//! through `hickory-proto`; header flags are read straight from the bytes.

use ferrous_doh_domain::DomainError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

/// Fixed DNS header length (RFC 1035 §4.1.1)
pub const HEADER_LEN: usize = 12;

/// TC bit in the third header byte
const FLAG_TRUNCATED: u8 = 0x02;

pub struct DnsMessage;

impl DnsMessage {
    /// Build a recursive query in wire format.
    ///
    /// The ID is 0, as RFC 8484 §4.1 recommends for DoH clients so that
    /// identical queries stay cache friendly.
    pub fn build_query(domain: &str, record_type: RecordType) -> Result<Vec<u8>, DomainError> {
        let name = Name::from_str(domain).map_err(|e| {
            DomainError::Protocol(format!("Invalid domain '{}': {}", domain, e))
        })?;

        let mut query = Query::new();
        query.set_name(name);
        query.set_query_type(record_type);
        query.set_query_class(DNSClass::IN);

        let mut message = Message::new(0, MessageType::Query, OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(query);

        Self::serialize(&message)
    }

    /// Parse `bytes` and require a query with at least one question.
    pub fn validate_query(bytes: &[u8]) -> Result<Message, DomainError> {
        if bytes.len() < HEADER_LEN {
            return Err(DomainError::Protocol(format!(
                "DNS message too short: {} bytes",
                bytes.len()
            )));
        }

        let message = Message::from_vec(bytes)
            .map_err(|e| DomainError::Protocol(format!("Malformed DNS message: {}", e)))?;

        if message.message_type() != MessageType::Query {
            return Err(DomainError::Protocol(
                "DNS message is a response, expected a query".to_string(),
            ));
        }

        if message.queries().is_empty() {
            return Err(DomainError::Protocol(
                "DNS query has no question".to_string(),
            ));
        }

        Ok(message)
    }

    /// SERVFAIL answer echoing the ID and question of `query_bytes`.
    pub fn servfail(query_bytes: &[u8], query: &Message) -> Result<Vec<u8>, DomainError> {
        let id = Self::id(query_bytes).unwrap_or(0);

        let mut response = Message::new(id, MessageType::Response, query.op_code());
        response.set_recursion_desired(query.recursion_desired());
        response.set_recursion_available(true);
        response.set_response_code(ResponseCode::ServFail);
        for question in query.queries() {
            response.add_query(question.clone());
        }

        Self::serialize(&response)
    }

    /// Smallest TTL among the answer records, `None` for empty or unparsable answers.
    pub fn min_answer_ttl(bytes: &[u8]) -> Option<u32> {
        let message = Message::from_vec(bytes).ok()?;
        message.answers().iter().map(|record| record.ttl()).min()
    }

    pub fn id(bytes: &[u8]) -> Option<u16> {
        match bytes {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    pub fn is_truncated(bytes: &[u8]) -> bool {
        bytes.len() >= HEADER_LEN && bytes[2] & FLAG_TRUNCATED != 0
    }

    fn serialize(message: &Message) -> Result<Vec<u8>, DomainError> {
        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);

        message.emit(&mut encoder).map_err(|e| {
            DomainError::Protocol(format!("Failed to serialize DNS message: {}", e))
        })?;

        Ok(buf)
    }
}
