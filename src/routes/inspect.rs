//! Client certificate inspection page.
//!
//! Answers every request on the verification listener. Authorized peers get
//! their certificate rendered as JSON inside a `<pre>` block; everyone else
//! gets a fixed 401 page.

use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use const_format::concatcp;
use http::StatusCode;

use crate::peer::{PeerAuthorization, PeerCertificate};

const PAGE_HEAD: &str = "<!doctype html><html><head><title>HTTPS Test</title></head><body>";
const PAGE_TAIL: &str = "</body></html>";

/// Body returned to peers without a valid client certificate
pub const NO_CLIENT_CERTIFICATE_PAGE: &str =
    concatcp!(PAGE_HEAD, "<h1>No Client Certificate</h1>", PAGE_TAIL);

/// Inspection handler.
///
/// A missing extension means the request did not arrive over the TLS
/// acceptor; it is treated as unauthorized.
pub async fn inspect(peer: Option<Extension<PeerAuthorization>>) -> Response {
    match peer.as_ref().and_then(|Extension(peer)| peer.certificate()) {
        Some(cert) => match render_certificate(cert) {
            Ok(body) => (StatusCode::OK, Html(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to render peer certificate");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        None => (StatusCode::UNAUTHORIZED, Html(NO_CLIENT_CERTIFICATE_PAGE)).into_response(),
    }
}

fn render_certificate(cert: &PeerCertificate) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(cert)?;
    Ok(format!("{PAGE_HEAD}<pre>{}</pre>{PAGE_TAIL}", escape_html(&json)))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
