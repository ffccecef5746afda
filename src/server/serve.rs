// Server loop module
// Accepts connections until a shutdown is signalled, then waits for them to drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::ShutdownSignal;
use crate::config::AppState;

/// Upper bound on how long shutdown waits for open connections
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop
///
/// Returns once `shutdown` fires and the open connections have finished or
/// the drain timeout expired.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<ShutdownSignal>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => tracing::error!("Failed to accept connection: {e}"),
                }
            }
            () = shutdown.wait() => {
                tracing::info!("Shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    drop(listener);
    drain(&active_connections).await;
    Ok(())
}

async fn drain(active_connections: &AtomicUsize) {
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    loop {
        let open = active_connections.load(Ordering::SeqCst);
        if open == 0 {
            tracing::info!("All connections closed");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("Drain timeout reached with {open} connection(s) still open");
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fallback::{AttemptResult, HeaderProfile, UpstreamClient};
    use crate::server::create_reusable_listener;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use url::Url;

    struct UnusedClient;

    #[async_trait]
    impl UpstreamClient for UnusedClient {
        async fn send(&self, _url: &Url, _profile: &HeaderProfile, _timeout: Duration) -> AttemptResult {
            unreachable!("health checks never reach the upstream")
        }
    }

    #[tokio::test]
    async fn test_serves_health_then_shuts_down() {
        let mut config = Config::load_from("does-not-exist/serve-test-config").unwrap();
        config.logging.access_log = false;
        let state = Arc::new(AppState::with_client(&config, Arc::new(UnusedClient)).unwrap());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(ShutdownSignal::new());
        let server = tokio::spawn(serve(listener, state, Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains("\"status\":\"OK\""));

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), server).await.unwrap();
        assert!(result.unwrap().is_ok());
    }
}
