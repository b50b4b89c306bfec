//! Load testing for the embedded server.

use std::time::{Duration, Instant};

use disco_light::config::WriteGateMode;
use disco_light::http::{Request, Response};
use disco_light::light::{Color, LightApi, LightState};
use disco_light::routing::handler_fn;

mod common;

use common::{body_of, exchange_text, local_config, route, start_server};

#[tokio::test]
async fn concurrent_connections_under_global_gate() {
    // Each client gets its own path echoed back, so crossed responses would show.
    let echo = handler_fn(|req: Request| async move {
        Response::new().with_content(format!("you asked for {}", req.uri))
    });
    let mut config = local_config();
    config.connection.write_gate = WriteGateMode::Global;
    config.connection.write_chunk_size = 8;
    let (mut server, addr) = start_server(config, vec![route("^/client/", echo)]).await;

    let concurrency = 50;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for i in 0..concurrency {
        tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let response = exchange_text(addr, &format!("GET /client/{} HTTP/1.1\r\n\r\n", i)).await;
            (i, response, started.elapsed())
        }));
    }

    let mut latencies = Vec::new();
    for task in tasks {
        let (i, response, latency) = task.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "client {i}: {response}");
        assert_eq!(body_of(&response), format!("you asked for /client/{}", i));
        latencies.push(latency);
    }

    let duration = start.elapsed();
    latencies.sort();
    let p50 = latencies[latencies.len() / 2];
    let p99 = latencies[(latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Connections:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    assert!(server.drain(Duration::from_secs(1)).await);
    assert!(server.try_next_error().is_none());
    server.stop().await;
}

#[tokio::test]
async fn real_client_smoke_test() {
    let light = LightState::new();
    let api = LightApi::new(light.clone(), "127.0.0.1", 0);
    let (mut server, addr) = start_server(local_config(), api.routes().unwrap()).await;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/json"
    );
    let status: serde_json::Value = serde_json::from_str(res.text().await.unwrap().trim()).unwrap();
    assert_eq!(status["status"], 200);

    let res = client
        .get(format!("http://{}/?color=336699", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().contains("#FF336699"));
    assert_eq!(light.current(), Color::rgb(0x33, 0x66, 0x99));

    let res = client
        .get(format!("http://{}/nothing-here", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Not found");

    server.stop().await;
}
