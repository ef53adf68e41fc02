use ferrous_doh_domain::DomainError;
use quinn::crypto::rustls::QuicServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::sync::Arc;

/// ALPN identifier for HTTP/3 (RFC 9114 §3.1)
pub const ALPN_H3: &[u8] = b"h3";

/// Build the QUIC TLS 1.3 server configuration from a PEM certificate chain and key.
///
/// Rejections surface as `DomainError::Bind`, so a failed `start()` leaves the
/// handle usable with corrected credentials.
pub fn build_quic_crypto(
    certificate_pem: &str,
    private_key_pem: &str,
) -> Result<Arc<QuicServerConfig>, DomainError> {
    let certificates = parse_certificates(certificate_pem)?;
    let private_key = parse_private_key(private_key_pem)?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut tls = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| DomainError::Bind(format!("TLS 1.3 unavailable: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certificates, private_key)
        .map_err(|e| DomainError::Bind(format!("Certificate/key pair rejected: {}", e)))?;
    tls.alpn_protocols = vec![ALPN_H3.to_vec()];

    let quic = QuicServerConfig::try_from(tls)
        .map_err(|e| DomainError::Bind(format!("TLS config unusable for QUIC: {}", e)))?;

    Ok(Arc::new(quic))
}

fn parse_certificates(pem: &str) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let mut reader = pem.as_bytes();
    let certificates = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DomainError::Bind(format!("Invalid certificate PEM: {}", e)))?;

    if certificates.is_empty() {
        return Err(DomainError::Bind(
            "No certificate found in PEM data".to_string(),
        ));
    }

    Ok(certificates)
}

fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, DomainError> {
    let mut reader = pem.as_bytes();
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| DomainError::Bind(format!("Invalid private key PEM: {}", e)))?
        .ok_or_else(|| DomainError::Bind("No private key found in PEM data".to_string()))
}
