//! Read-only static file serving for distribution routes.
//!
//! Each route gets its own `ServeDir` rooted at the route's source directory.
//! `ServeDir` refuses `..` traversal, answers 404 for missing files, and
//! handles conditional requests via `Last-Modified`. Routes sharing a mount
//! path are chained, so a miss in one directory falls through to the next.

use axum::Router;
use tower_http::services::ServeDir;

use crate::distribution::DistributionRoute;

/// Create the file service for one route.
pub fn create_route_service(route: &DistributionRoute) -> ServeDir {
    let source = route.source_dir();
    if !source.is_dir() {
        tracing::warn!(
            mount = %route.mount_path(),
            dir = %source.display(),
            "Distribution source directory does not exist; requests will return 404"
        );
    }
    ServeDir::new(source)
}

/// Create the service for every route mounted at one path.
///
/// The directories are tried in order; a file missing from all of them is a
/// 404 from the empty router at the end of the chain.
pub fn create_mount_service(routes: &[&DistributionRoute]) -> Router {
    routes.iter().rev().fold(Router::new(), |next, route| {
        Router::new().fallback_service(create_route_service(route).fallback(next))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(service: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = service
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_missing_directory_serves_not_found() {
        let route = DistributionRoute::new("/crl", "/nonexistent/ca/crl");
        let (status, _) = get(create_mount_service(&[&route]), "/root_ca.crl").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shared_mount_falls_through_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("crl");
        let second = dir.path().join("certs");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();
        std::fs::write(first.join("root_ca.crl"), b"crl").unwrap();
        std::fs::write(first.join("both.txt"), b"from crl").unwrap();
        std::fs::write(second.join("root_ca.pem"), b"pem").unwrap();
        std::fs::write(second.join("both.txt"), b"from certs").unwrap();

        let crl = DistributionRoute::new("/pki", &first);
        let aia = DistributionRoute::new("/pki", &second);
        let service = create_mount_service(&[&crl, &aia]);

        assert_eq!(get(service.clone(), "/root_ca.crl").await, (StatusCode::OK, b"crl".to_vec()));
        assert_eq!(get(service.clone(), "/root_ca.pem").await, (StatusCode::OK, b"pem".to_vec()));
        assert_eq!(get(service.clone(), "/both.txt").await.1, b"from crl");
        assert_eq!(get(service, "/absent.crl").await.0, StatusCode::NOT_FOUND);
    }
}
