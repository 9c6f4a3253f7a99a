//! Routers for the two listeners.
//!
//! The verification router answers every method and path with the
//! inspection page. The distribution router mounts the read-only directories
//! of each mount path and 404s everything else. Both are wrapped in the access log
//! middleware.

pub mod inspect;

use axum::{middleware, Router};

use crate::distribution::{group_by_mount, DistributionRoute};
use crate::http::static_files::create_mount_service;
use crate::middleware::access_log_layer;

/// Creates the router of the verification listener.
pub fn create_verification_router() -> Router {
    Router::new()
        .fallback(inspect::inspect)
        .layer(middleware::from_fn(access_log_layer))
}

/// Creates the router of the distribution listener.
pub fn create_distribution_router(routes: &[DistributionRoute]) -> Router {
    let mut router = Router::new();
    for (mount, group) in group_by_mount(routes) {
        let service = create_mount_service(&group);
        router = if mount == "/" {
            router.fallback_service(service)
        } else {
            router.nest_service(mount, service)
        };
    }

    router.layer(middleware::from_fn(access_log_layer))
}
