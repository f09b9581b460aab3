//! HTTP stream server listener
//!
//! Binds the listener and drives the router until shutdown, then gives open
//! responses up to `drain_timeout` to finish.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::publish::FrameFeed;
use crate::server::config::ServerConfig;
use crate::server::routes::{self, ServerContext};
use crate::shutdown::ShutdownSignal;
use crate::state::DetectionState;
use crate::stats::Stats;

/// MJPEG stream server
pub struct StreamServer {
    ctx: Arc<ServerContext>,
}

impl StreamServer {
    /// Create a server for `feed` with private state and stats
    pub fn new(config: ServerConfig, feed: FrameFeed) -> Self {
        Self::with_shared(
            config,
            feed,
            Arc::new(DetectionState::new()),
            Arc::new(Stats::new()),
        )
    }

    /// Create a server that reports the given detection state and stats
    pub fn with_shared(
        config: ServerConfig,
        feed: FrameFeed,
        state: Arc<DetectionState>,
        stats: Arc<Stats>,
    ) -> Self {
        let limiter = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            ctx: Arc::new(ServerContext {
                config,
                feed,
                state,
                stats,
                shutdown: ShutdownSignal::new(),
                limiter,
            }),
        }
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails to bind.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.ctx.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Once `shutdown` resolves no new connections are accepted, open streams
    /// send their closing delimiter, and this returns when every response has
    /// finished or `drain_timeout` has passed.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.ctx.config.validate()?;

        tracing::info!(
            addr = %listener.local_addr()?,
            stream = %self.ctx.config.stream_path,
            "HTTP server listening"
        );

        let draining = self.ctx.shutdown.clone();
        let server = axum::serve(listener, routes::router(Arc::clone(&self.ctx)))
            .tcp_nodelay(self.ctx.config.tcp_nodelay)
            .with_graceful_shutdown(async move { draining.wait().await })
            .into_future();
        tokio::pin!(server);
        tokio::pin!(shutdown);

        let result = tokio::select! {
            result = &mut server => result,
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                self.ctx.shutdown.trigger();
                self.drain(&mut server).await
            }
        };

        self.ctx.shutdown.trigger();
        Ok(result?)
    }

    async fn drain<S>(&self, server: &mut S) -> std::io::Result<()>
    where
        S: Future<Output = std::io::Result<()>> + Unpin,
    {
        let timeout = self.ctx.config.drain_timeout;
        match tokio::time::timeout(timeout, server).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    active_streams = self.ctx.stats.server.snapshot().active_streams,
                    "Open responses did not finish before the drain timeout"
                );
                Ok(())
            }
        }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.ctx.config.bind_addr
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.ctx.config
    }
}
