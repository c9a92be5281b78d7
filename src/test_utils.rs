// Shared helpers for unit tests that talk to throwaway HTTP services.

use axum::Router;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server crashed");
    });
    format!("http://{addr}")
}
