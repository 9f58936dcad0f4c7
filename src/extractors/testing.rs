//! Local HTTP stand-ins for the caption endpoints.

use axum::Router;
use tokio::net::TcpListener;

/// Serve `build(base_url)` on an ephemeral port and return its base URL
pub async fn spawn<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let base_url = format!("http://{}", listener.local_addr().expect("local address"));
    let app = build(base_url.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    base_url
}
