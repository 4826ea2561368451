use std::net::SocketAddr;
use std::time::Duration;
use tandem_server::{SignalHub, serve_on};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Signal store service bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: SignalHub,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_retention(Duration::from_secs(60)).await
    }

    pub async fn with_retention(retention: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let hub = SignalHub::new(retention);

        let handle = tokio::spawn({
            let hub = hub.clone();
            async move {
                let _ = serve_on(listener, hub).await;
            }
        });

        Self { addr, hub, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
