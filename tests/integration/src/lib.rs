use std::sync::Arc;
use std::time::Duration;

use valdore_client::remote::RemoteBackend;
use valdore_node::memory::MemoryBackend;
use valdore_node::Node;

pub mod harness;
pub mod scenarios;

/// How long a participant waits for a live update before the test fails.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const ADMIN_EMAIL: &str = "administrador@cafevaldore.com";
pub const PASSWORD: &str = "secreto1";

/// Enable `RUST_LOG`-controlled output for a test run. Safe to call twice.
pub fn init_tracing() {
    tracing_subscriber::fmt::try_init().ok();
}

/// A fresh in-process backend session on `node`.
pub fn connect_memory(node: &Arc<Node>) -> MemoryBackend {
    node.connect()
}

/// Serve `node` on an ephemeral port and return its base URL.
pub async fn serve(node: &Arc<Node>) -> String {
    let (addr, _) = valdore_node::server::spawn(node.clone(), "127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("failed to serve node: {e}"));
    format!("http://{addr}")
}

/// A fresh HTTP/WebSocket session against a served node.
pub fn connect_remote(base_url: &str) -> RemoteBackend {
    RemoteBackend::new(base_url)
}
