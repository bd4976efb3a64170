use std::sync::Arc;

use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
	sync::RwLock,
};

/// Whatever the health check needs to report on. The worker binary updates
/// this after each successful Store round-trip / queue poll tick.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
	pub store_connected: bool,
	pub queue_pollers_alive: bool,
}

impl HealthState {
	fn is_healthy(&self) -> bool {
		self.store_connected && self.queue_pollers_alive
	}
}

/// Minimal liveness probe: bind a `TcpListener`, read one HTTP request line
/// with `httparse`, and answer `/health` with a canned 200/503. No axum, no
/// router — this is the one endpoint the worker exposes outside of metrics.
pub struct HealthChecker {
	listener: TcpListener,
	state: Arc<RwLock<HealthState>>,
}

impl HealthChecker {
	pub async fn new(hostname: &str, port: u16, state: Arc<RwLock<HealthState>>) -> anyhow::Result<Self> {
		let listener = TcpListener::bind((hostname, port)).await?;
		tracing::info!(%hostname, port, "health check server listening");
		Ok(Self { listener, state })
	}

	pub async fn run(self) -> anyhow::Result<()> {
		loop {
			let (mut stream, _) = self.listener.accept().await?;
			let state = self.state.clone();
			tokio::spawn(async move {
				let mut buf = [0u8; 1024];
				let n = match stream.read(&mut buf).await {
					Ok(n) => n,
					Err(e) => {
						tracing::warn!(error = %e, "health check read failed");
						return;
					}
				};

				let mut headers = [httparse::EMPTY_HEADER; 16];
				let mut req = httparse::Request::new(&mut headers);
				let response = match req.parse(&buf[..n]) {
					Ok(_) if req.path == Some("/health") => {
						if state.read().await.is_healthy() {
							"HTTP/1.1 200 OK\r\n\r\n"
						} else {
							"HTTP/1.1 503 Service Unavailable\r\n\r\n"
						}
					}
					Ok(_) => {
						tracing::warn!(path = ?req.path, "health check received unexpected path");
						"HTTP/1.1 404 Not Found\r\n\r\n"
					}
					Err(e) => {
						tracing::warn!(error = %e, "failed to parse health check request");
						"HTTP/1.1 400 Bad Request\r\n\r\n"
					}
				};

				let _ = stream.write_all(response.as_bytes()).await;
			});
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn health_check_reports_unhealthy_until_marked() {
		let state = Arc::new(RwLock::new(HealthState::default()));
		let checker = HealthChecker::new("127.0.0.1", 0, state.clone()).await.unwrap();
		let addr = checker.listener.local_addr().unwrap();
		tokio::spawn(checker.run());

		let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
		stream.write_all(b"GET /health HTTP/1.1\r\n\r\n").await.unwrap();
		let mut buf = [0u8; 64];
		let n = stream.read(&mut buf).await.unwrap();
		assert!(String::from_utf8_lossy(&buf[..n]).contains("503"));

		{
			let mut guard = state.write().await;
			guard.store_connected = true;
			guard.queue_pollers_alive = true;
		}

		let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
		stream.write_all(b"GET /health HTTP/1.1\r\n\r\n").await.unwrap();
		let n = stream.read(&mut buf).await.unwrap();
		assert!(String::from_utf8_lossy(&buf[..n]).contains("200"));
	}
}
