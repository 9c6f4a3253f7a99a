//! Peer authorization and certificate rendering.
//!
//! `authorize` is the single decision point for the verification listener: it
//! maps what the TLS layer learned about the client to a `PeerAuthorization`
//! that the request handler turns into a response. It performs no I/O and no
//! cryptography, so it can be exercised without a TLS stack.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::DateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;
use x509_parser::time::ASN1Time;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

/// Outcome of evaluating a client for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAuthorization {
    /// The client presented a certificate that chains to the trust root.
    Authorized(PeerCertificate),
    Unauthorized(UnauthorizedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// No certificate was presented.
    NoCertificate,
    /// A certificate was presented but failed validation.
    Untrusted,
}

impl PeerAuthorization {
    pub fn is_authorized(&self) -> bool {
        matches!(self, PeerAuthorization::Authorized(_))
    }

    /// Fields of the validated peer certificate, if authorized.
    pub fn certificate(&self) -> Option<&PeerCertificate> {
        match self {
            PeerAuthorization::Authorized(cert) => Some(cert),
            PeerAuthorization::Unauthorized(_) => None,
        }
    }
}

/// Decide whether a peer is authorized.
///
/// `peer_verified` is the transport's verdict on the presented chain;
/// `certificate` is the parsed end-entity certificate, `None` when nothing was
/// presented. A verified flag without a certificate is never authorized.
pub fn authorize(peer_verified: bool, certificate: Option<PeerCertificate>) -> PeerAuthorization {
    match certificate {
        Some(cert) if peer_verified => PeerAuthorization::Authorized(cert),
        Some(_) => PeerAuthorization::Unauthorized(UnauthorizedReason::Untrusted),
        None => PeerAuthorization::Unauthorized(UnauthorizedReason::NoCertificate),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to parse peer certificate: {0}")]
pub struct CertificateParseError(String);

/// Human-readable view of an X.509 certificate.
///
/// Field names follow the OpenSSL-style peer certificate objects operators are
/// used to seeing from TLS diagnostic tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerCertificate {
    pub subject: NameFields,
    pub issuer: NameFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjectaltname: Option<String>,
    pub ca: bool,
    pub valid_from: String,
    pub valid_to: String,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    pub fingerprint256: String,
}

/// Commonly used attributes of a distinguished name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameFields {
    #[serde(rename = "C", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "ST", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "L", skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(rename = "O", skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(rename = "OU", skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "CN", skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(rename = "emailAddress", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PeerCertificate {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateParseError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CertificateParseError(e.to_string()))?;

        Ok(Self {
            subject: NameFields::from_name(cert.subject()),
            issuer: NameFields::from_name(cert.issuer()),
            subjectaltname: subject_alt_names(&cert),
            ca: cert.is_ca(),
            valid_from: format_time(&cert.validity().not_before),
            valid_to: format_time(&cert.validity().not_after),
            serial_number: serial_hex(cert.tbs_certificate.raw_serial()),
            fingerprint256: hex_upper(&Sha256::digest(der), ":"),
        })
    }
}

impl NameFields {
    fn from_name(name: &X509Name<'_>) -> Self {
        fn first<'s, 'n: 's>(
            mut iter: impl Iterator<Item = &'s AttributeTypeAndValue<'n>>,
        ) -> Option<String> {
            iter.next()
                .and_then(|attr| attr.as_str().ok())
                .map(str::to_owned)
        }

        Self {
            country: first(name.iter_country()),
            state: first(name.iter_state_or_province()),
            locality: first(name.iter_locality()),
            organization: first(name.iter_organization()),
            organizational_unit: first(name.iter_organizational_unit()),
            common_name: first(name.iter_common_name()),
            email: first(name.iter_email()),
        }
    }
}

/// Render the SAN extension as `DNS:a, IP Address:b, ...`.
fn subject_alt_names(cert: &X509Certificate<'_>) -> Option<String> {
    let san = cert.subject_alternative_name().ok().flatten()?;
    let names: Vec<String> = san
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(format!("DNS:{dns}")),
            GeneralName::URI(uri) => Some(format!("URI:{uri}")),
            GeneralName::RFC822Name(email) => Some(format!("email:{email}")),
            GeneralName::IPAddress(bytes) => format_ip(bytes).map(|ip| format!("IP Address:{ip}")),
            _ => None,
        })
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn format_ip(bytes: &[u8]) -> Option<String> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(Ipv4Addr::from(octets).to_string())
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(Ipv6Addr::from(octets).to_string())
        }
        _ => None,
    }
}

/// OpenSSL's `notBefore`/`notAfter` style, e.g. `Jan  1 00:00:00 2030 GMT`.
fn format_time(time: &ASN1Time) -> String {
    let timestamp = time.timestamp();
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%b %e %H:%M:%S %Y GMT").to_string(),
        None => timestamp.to_string(),
    }
}

/// Render a DER integer serial without its sign padding byte.
fn serial_hex(raw: &[u8]) -> String {
    match raw {
        [0x00, next, ..] if next & 0x80 != 0 => hex_upper(&raw[1..], ""),
        _ => hex_upper(raw, ""),
    }
}

fn hex_upper(bytes: &[u8], separator: &str) -> String {
    let mut out = String::with_capacity(bytes.len() * (2 + separator.len()));
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}
