//! Serves an app on a local port and talks HTTP/1.1 to it over TCP.

use std::time::Duration;

use serde_json::json;
use tessera_config::TesseraConfig;
use tessera_core::{BoxFuture, Reply, Request, TesseraResult};
use tessera_server::{ActionSignature, App, Args, Controller, Server, ShutdownSignal};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Ping;

impl Controller for Ping {
    fn actions(&self) -> Vec<ActionSignature> {
        vec![ActionSignature::new("index")]
    }

    fn call<'a>(
        &'a self,
        _action: &'a str,
        _request: &'a mut Request,
        _args: Args,
    ) -> BoxFuture<'a, TesseraResult<Reply>> {
        Box::pin(async move { Ok(json!({"pong": true}).into()) })
    }
}

async fn exchange(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

async fn start(config: TesseraConfig) -> (std::net::SocketAddr, ShutdownSignal, tokio::task::JoinHandle<()>) {
    let app = App::builder(config)
        .controller("Ping", |_| Ping)
        .build()
        .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let server = Server::new(app);
    let signal = shutdown.clone();
    let task = tokio::spawn(async move {
        server.serve_on(listener, signal).await.unwrap();
    });
    (addr, shutdown, task)
}

#[tokio::test]
async fn test_serves_requests_until_shutdown() {
    let (addr, shutdown, task) = start(TesseraConfig::default()).await;

    let reply = exchange(
        addr,
        "GET /ping/index HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 200"), "{reply}");
    assert!(reply.contains("application/json"));
    assert!(reply.ends_with(r#"{"pong":true}"#));

    let reply = exchange(
        addr,
        "GET /nowhere/at/all HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 404"), "{reply}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = TesseraConfig::default();
    config.server.max_body_bytes = 8;
    let (addr, shutdown, task) = start(config).await;

    let reply = exchange(
        addr,
        "POST /ping/index HTTP/1.1\r\nhost: localhost\r\ncontent-length: 31\r\nconnection: close\r\n\r\n{\"payload\":\"way too long...\"}  ",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 413"), "{reply}");

    shutdown.trigger();
    task.await.unwrap();
}
