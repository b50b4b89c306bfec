//! Wire-level behaviour of a running server, asserted byte for byte.

use std::time::Duration;

use disco_light::http::codec::NOT_FOUND_RESPONSE;
use disco_light::http::{Request, Response};
use disco_light::light::{Color, LightApi, LightState};
use disco_light::routing::handler_fn;

mod common;

use common::{body_of, exchange, exchange_text, local_config, route, start_server, text};

#[tokio::test]
async fn unmatched_uri_gets_fixed_404() {
    let (_server, addr) = start_server(local_config(), vec![route("^/$", text("home"))]).await;

    let response = exchange(addr, b"GET /missing HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert_eq!(response, NOT_FOUND_RESPONSE);
}

#[tokio::test]
async fn unsupported_method_gets_no_bytes() {
    let (mut server, addr) = start_server(local_config(), vec![route("^/$", text("home"))]).await;

    let response = exchange(addr, b"PUT / HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    let error = tokio::time::timeout(Duration::from_secs(1), server.next_error())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(error.code(), -3);
}

#[tokio::test]
async fn nil_content_is_framed_with_zero_length() {
    let handler = handler_fn(|_req: Request| async { Response::new() });
    let (_server, addr) = start_server(local_config(), vec![route("^/empty$", handler)]).await;

    let response = exchange_text(addr, "GET /empty HTTP/1.1\r\n\r\n").await;
    assert_eq!(
        response,
        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
}

#[tokio::test]
async fn content_is_framed_with_its_length() {
    let (_server, addr) = start_server(local_config(), vec![route("^/hello$", text("hello"))]).await;

    let response = exchange_text(addr, "GET /hello HTTP/1.1\r\n\r\n").await;
    assert_eq!(
        response,
        "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\nhello"
    );
}

#[tokio::test]
async fn location_header_makes_a_redirect() {
    let handler = handler_fn(|_req: Request| async { Response::redirect("/elsewhere") });
    let (_server, addr) = start_server(local_config(), vec![route("^/old$", handler)]).await;

    let response = exchange_text(addr, "GET /old HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 302\r\n"), "{response}");
    assert!(response.contains("Location: /elsewhere\r\n"));
    assert!(response.contains("Content-Length: 0\r\n"));
}

#[tokio::test]
async fn post_body_reaches_the_handler() {
    let echo = handler_fn(|mut req: Request| async move {
        let body = req.body.read_all().unwrap_or_default();
        Response::new().with_content(body)
    });
    let (_server, addr) = start_server(local_config(), vec![route("^/echo$", echo)]).await;

    let response = exchange_text(
        addr,
        "POST /echo HTTP/1.1\r\nContent-Type: text/plain\r\n\r\nred=1&green=2",
    )
    .await;
    assert!(response.contains("Content-Length: 13\r\n"));
    assert_eq!(body_of(&response), "red=1&green=2");
}

#[tokio::test]
async fn body_above_spill_threshold_is_read_back_from_disk() {
    let echo = handler_fn(|mut req: Request| async move {
        let spilled = req.body.is_spilled();
        let body = req.body.read_all().unwrap_or_default();
        Response::new()
            .with_header("X-Spilled", spilled.to_string())
            .with_content(body)
    });
    let mut config = local_config();
    config.connection.spill_threshold = 4096;
    let (_server, addr) = start_server(config, vec![route("^/echo$", echo)]).await;

    let payload: String = (0..20_000).map(|i| (b'a' + (i % 26) as u8) as char).collect();
    let request = format!("POST /echo HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n{}", payload);

    let response = exchange_text(addr, &request).await;
    assert!(response.contains("X-Spilled: true\r\n"), "response of {} bytes", response.len());
    assert!(response.contains("Content-Length: 20000\r\n"));
    assert_eq!(body_of(&response), payload);
}

#[tokio::test]
async fn large_body_is_written_in_full() {
    let payload: &'static str = Box::leak("0123456789abcdef".repeat(300).into_boxed_str());
    let (_server, addr) = start_server(local_config(), vec![route("^/big$", text(payload))]).await;

    let response = exchange_text(addr, "GET /big HTTP/1.1\r\n\r\n").await;
    assert!(response.contains("Content-Length: 4800\r\n"));
    assert_eq!(body_of(&response), payload);
}

#[tokio::test]
async fn first_registered_route_wins() {
    let routes = vec![route("^/x$", text("r1")), route("^/x", text("r2"))];
    let (_server, addr) = start_server(local_config(), routes).await;

    for _ in 0..5 {
        let response = exchange_text(addr, "GET /x HTTP/1.1\r\n\r\n").await;
        assert_eq!(body_of(&response), "r1");
    }
    let response = exchange_text(addr, "GET /xyz HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_of(&response), "r2");
}

#[tokio::test]
async fn light_api_routes_root_and_color() {
    let light = LightState::new();
    let api = LightApi::new(light.clone(), "127.0.0.1", 8081);
    let (_server, addr) = start_server(local_config(), api.routes().unwrap()).await;

    let home = exchange_text(addr, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(home.contains("Content-Type: application/json\r\n"));
    assert!(body_of(&home).contains("The API is available at http://127.0.0.1:8081/?color=######"));
    assert_eq!(light.current(), Color::WHITE);

    let set = exchange_text(addr, "GET /?color=ff8800 HTTP/1.1\r\n\r\n").await;
    assert_eq!(
        body_of(&set),
        "{\"status\":200,\"message\":\"Color was set to #FFFF8800\"}\n"
    );
    assert_eq!(light.current(), Color::rgb(0xFF, 0x88, 0x00));

    let other = exchange(addr, b"GET /?colour=ff8800 HTTP/1.1\r\n\r\n").await;
    assert_eq!(other, NOT_FOUND_RESPONSE);
}
