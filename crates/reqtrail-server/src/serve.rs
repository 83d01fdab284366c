//! Serving with a bounded graceful shutdown

use std::{future::Future, future::IntoFuture, net::SocketAddr, time::Duration};

use axum::Router;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{info, warn};

/// Serve `app` until `shutdown` resolves, then give open connections at most
/// `drain_timeout` to finish
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    drain_timeout: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        let _ = draining_tx.send(());
    })
    .into_future();

    let deadline = async move {
        match draining_rx.await {
            Ok(()) => {
                info!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Waiting for connections to close"
                );
                tokio::time::sleep(drain_timeout).await;
            },
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => {
            result?;
            info!("Server shut down gracefully");
        },
        _ = deadline => {
            warn!("Shutdown timeout elapsed, closing remaining connections");
        },
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn slow_app() -> Router {
        Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        )
    }

    #[tokio::test]
    async fn test_idle_server_stops_on_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            serve(listener, slow_app(), Duration::from_secs(30), async {}),
        )
        .await;

        assert!(finished.expect("idle server should stop at once").is_ok());
    }

    #[tokio::test]
    async fn test_drain_timeout_bounds_open_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            slow_app(),
            Duration::from_millis(200),
            async move {
                let _ = stop_rx.await;
            },
        ));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(()).unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
        assert!(finished.is_ok(), "shutdown waited for the slow request");
        finished.unwrap().unwrap().unwrap();
        drop(client);
    }
}
