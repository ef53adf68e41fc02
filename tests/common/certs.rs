use rustls::pki_types::CertificateDer;

/// Self-signed identity for `localhost`, trusted directly by the test client.
pub struct TestIdentity {
    pub cert_pem: String,
    pub key_pem: String,
    pub cert_der: CertificateDer<'static>,
}

impl TestIdentity {
    pub fn localhost() -> Self {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("Failed to generate self-signed certificate");

        Self {
            cert_pem: certified.cert.pem(),
            key_pem: certified.key_pair.serialize_pem(),
            cert_der: certified.cert.der().clone(),
        }
    }
}
