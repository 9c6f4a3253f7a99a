//! Throwaway PKI and client helpers shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::Handle;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SerialNumber,
};
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use ca_webservices::http::VerificationServer;
use ca_webservices::tls::TrustConfiguration;

/// A self-signed certificate authority.
pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

/// A certificate issued by a `TestCa`, with its key.
pub struct Issued {
    pub cert_pem: String,
    pub key_pem: String,
    pub cert_der: CertificateDer<'static>,
}

fn name(cn: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    dn.push(DnType::OrganizationName, "Test CA Operators");
    dn
}

impl TestCa {
    pub fn new(cn: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = name(cn);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn issue(&self, cn: &str, sans: &[&str], serial: &[u8]) -> Issued {
        let sans: Vec<String> = sans.iter().map(|s| s.to_string()).collect();
        let mut params = CertificateParams::new(sans).unwrap();
        params.distinguished_name = name(cn);
        params.serial_number = Some(SerialNumber::from_slice(serial));
        self.sign(params)
    }

    pub fn issue_expired(&self, cn: &str) -> Issued {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = name(cn);
        params.not_before = rcgen::date_time_ymd(2000, 1, 1);
        params.not_after = rcgen::date_time_ymd(2001, 1, 1);
        self.sign(params)
    }

    fn sign(&self, params: CertificateParams) -> Issued {
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Issued {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            cert_der: cert.der().clone(),
        }
    }
}

/// CA, server certificate for `localhost`, and the trust configuration
/// built from them.
pub struct Fixture {
    pub ca: TestCa,
    pub server: Issued,
}

impl Fixture {
    pub fn new() -> Self {
        let ca = TestCa::new("Test Root CA");
        let server = ca.issue("localhost", &["localhost"], &[0x01]);
        Self { ca, server }
    }

    pub fn trust(&self, require_client_cert: bool) -> TrustConfiguration {
        TrustConfiguration::from_pem(
            self.server.cert_pem.as_bytes(),
            self.server.key_pem.as_bytes(),
            self.ca.pem().as_bytes(),
            require_client_cert,
        )
        .unwrap()
    }

    /// Start a verification server on an ephemeral port.
    pub async fn start(&self, require_client_cert: bool) -> (SocketAddr, Handle) {
        let server = VerificationServer::new(
            &self.trust(require_client_cert),
            "127.0.0.1:0".parse().unwrap(),
        )
        .unwrap();
        let handle = Handle::new();
        tokio::spawn(server.serve(handle.clone()));
        let addr = handle.listening().await.expect("server did not start");
        (addr, handle)
    }
}

/// Issue one HTTPS request and return the raw response.
///
/// Errors surface handshake failures; a connection closed before any bytes
/// arrive yields an empty response.
pub async fn https_get(
    addr: SocketAddr,
    ca: &TestCa,
    identity: Option<&Issued>,
) -> std::io::Result<String> {
    let mut roots = RootCertStore::empty();
    roots.add(ca.der()).unwrap();

    let builder =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots);
    let config = match identity {
        Some(id) => builder
            .with_client_auth_cert(
                vec![id.cert_der.clone()],
                PrivateKeyDer::from_pem_slice(id.key_pem.as_bytes()).unwrap(),
            )
            .unwrap(),
        None => builder.with_no_client_auth(),
    };

    let tcp = TcpStream::connect(addr).await?;
    let connector = TlsConnector::from(Arc::new(config));
    let mut tls = connector
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await?;

    tls.write_all(b"GET /anything?x=1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    read_response(&mut tls).await
}

/// Issue one plain HTTP GET and return the raw response.
pub async fn http_get(addr: SocketAddr, path: &str) -> std::io::Result<String> {
    let mut tcp = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    tcp.write_all(request.as_bytes()).await?;
    read_response(&mut tcp).await
}

async fn read_response<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if buf.is_empty() => return Err(e),
            // Peer closed without close_notify after sending the response
            Err(_) => break,
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Status code from the first line of a raw response.
pub fn status(response: &str) -> Option<u16> {
    response
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}
