//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use disco_light::http::{Request, Response, Server, ServerHandle};
use disco_light::routing::{handler_fn, Handler, Route, Router};
use disco_light::ServerConfig;

/// Default config bound to an ephemeral loopback port.
pub fn local_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config
}

/// Start a server and wait for it to bind.
pub async fn start_server(config: ServerConfig, routes: Vec<Route>) -> (ServerHandle, SocketAddr) {
    let handle = Server::new(config, Router::new(routes)).start();
    let addr = handle.local_addr().await.expect("test server failed to bind");
    (handle, addr)
}

/// Handler that answers with a fixed text body.
pub fn text(body: &'static str) -> Handler {
    handler_fn(move |_req: Request| async move {
        Response::new()
            .with_header("Content-Type", "text/plain")
            .with_content(body)
    })
}

pub fn route(pattern: &str, handler: Handler) -> Route {
    Route::new(pattern, handler).unwrap()
}

/// Send raw request bytes, half-close, and collect everything until the server closes.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    response
}

pub async fn exchange_text(addr: SocketAddr, request: &str) -> String {
    String::from_utf8(exchange(addr, request.as_bytes()).await).unwrap()
}

/// Body part of a raw response.
pub fn body_of(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}
