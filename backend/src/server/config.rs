//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use fastpay_backend::domain::ports::FirebaseTreeSource;
use fastpay_backend::outbound::persistence::DbPool;

/// Configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: DbPool,
    pub(crate) tree_source: Arc<dyn FirebaseTreeSource>,
}

impl ServerConfig {
    /// Construct a server configuration around an established pool and
    /// tree source.
    #[must_use]
    pub fn new(
        bind_addr: SocketAddr,
        db_pool: DbPool,
        tree_source: Arc<dyn FirebaseTreeSource>,
    ) -> Self {
        Self {
            bind_addr,
            db_pool,
            tree_source,
        }
    }
}
