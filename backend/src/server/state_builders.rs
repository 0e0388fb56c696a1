//! Builders for HTTP state from the configured adapters.

use std::sync::Arc;

use actix_web::web;

use fastpay_backend::inbound::http::state::HttpState;
use fastpay_backend::wiring;

use super::ServerConfig;

/// Wire the Diesel repositories and the tree source into the driving ports
/// handlers depend on.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let (sync_service, status_service) =
        wiring::sync_services(&config.db_pool, config.tree_source.clone());
    web::Data::new(HttpState::new(
        Arc::new(status_service),
        Arc::new(sync_service),
    ))
}
