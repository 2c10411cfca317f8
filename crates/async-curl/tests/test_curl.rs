use std::time::{Duration, Instant};

use async_curl::{AsyncCurl, CurlConfig, Error, RequestOptions, Task};
use futures_util::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve `/0` .. `/{n-1}`, each answering with its own index.
async fn numbered_server(n: usize) -> MockServer {
    let server = MockServer::start().await;
    for i in 0..n {
        Mock::given(method("GET"))
            .and(path(format!("/{i}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(i.to_string()))
            .expect(1)
            .mount(&server)
            .await;
    }
    server
}

fn numbered_tasks(server: &MockServer, n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| Task::from(format!("{}/{i}", server.uri())))
        .collect()
}

#[tokio::test]
async fn test_chunks_cover_every_task_once() {
    let server = numbered_server(7).await;
    let tasks = numbered_tasks(&server, 7);
    let mut curl = AsyncCurl::new(tasks.clone()).unwrap();

    let chunks: Vec<Vec<String>> = curl
        .run_tasks(3)
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    // ceil(7 / 3) chunks, in queue order.
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0], ["0", "1", "2"]);
    assert_eq!(chunks[1], ["3", "4", "5"]);
    assert_eq!(chunks[2], ["6"]);

    assert!(curl.is_empty());
    assert_eq!(curl.completed(), tasks.as_slice());
}

#[tokio::test]
async fn test_chunk_larger_than_queue() {
    let server = numbered_server(2).await;
    let mut curl = AsyncCurl::new(numbered_tasks(&server, 2)).unwrap();

    let first = curl.next_chunk(10).await.unwrap().unwrap();
    assert_eq!(first, ["0", "1"]);
    assert!(curl.next_chunk(10).await.is_none());
}

#[tokio::test]
async fn test_chunk_runs_concurrently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(500)),
        )
        .expect(4)
        .mount(&server)
        .await;

    let mut curl = AsyncCurl::new(numbered_tasks(&server, 4)).unwrap();

    let start = Instant::now();
    let bodies = curl.next_chunk(4).await.unwrap().unwrap();
    assert_eq!(bodies.len(), 4);
    assert!(start.elapsed() < Duration::from_millis(1500));
}

#[tokio::test]
async fn test_bare_url_is_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bare"))
        .respond_with(ResponseTemplate::new(200).set_body_string("got"))
        .expect(1)
        .mount(&server)
        .await;

    let curl = AsyncCurl::new(Vec::<Task>::new()).unwrap();
    let body = curl
        .request(&Task::from(format!("{}/bare", server.uri())))
        .await
        .unwrap();
    assert_eq!(body, "got");
}

#[tokio::test]
async fn test_explicit_method_overrides_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(query_param("page", "2"))
        .and(header("x-token", "abc"))
        .and(body_json(json!({"name": "curl"})))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let value = json!([
        format!("{}/submit", server.uri()),
        {
            "method": "post",
            "params": {"page": 2},
            "headers": {"x-token": "abc"},
            "json": {"name": "curl"}
        }
    ]);

    let mut curl = AsyncCurl::new(Vec::<Task>::new()).unwrap();
    curl.try_append(value).unwrap();
    let bodies = curl.next_chunk(1).await.unwrap().unwrap();
    assert_eq!(bodies, ["created"]);
}

#[tokio::test]
async fn test_default_method_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("put"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
        .expect(1)
        .mount(&server)
        .await;

    let config = CurlConfig {
        default_method: "put".into(),
        ..Default::default()
    };
    let tasks = vec![
        Task::from((server.uri(), RequestOptions::new().with_data("payload"))),
        Task::from((server.uri(), RequestOptions::new().with_method("DELETE"))),
    ];
    let mut curl = AsyncCurl::with_config(tasks, &config).unwrap();
    let bodies = curl.next_chunk(2).await.unwrap().unwrap();
    assert_eq!(bodies, ["put", "deleted"]);
}

#[tokio::test]
async fn test_malformed_task_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tasks = json!([format!("{}/a", server.uri()), 42]);
    let err = serde_json::from_value::<Vec<Task>>(tasks).unwrap_err();
    assert!(err.to_string().contains("integer"));

    let mut curl = AsyncCurl::new([format!("{}/a", server.uri())]).unwrap();
    let err = curl.try_append(json!({"url": server.uri()})).unwrap_err();
    assert!(matches!(err, Error::InvalidTask(_)));
    assert_eq!(curl.pending_len(), 1);
    assert!(curl.completed().is_empty());
}

#[tokio::test]
async fn test_unsendable_task_rejected_at_enqueue() {
    let server = numbered_server(2).await;
    let mut curl = AsyncCurl::new(numbered_tasks(&server, 2)).unwrap();

    let err = curl
        .try_append(json!([server.uri(), {"headers": {"bad header": "x"}}]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidHeaderName(_)));

    let err = curl.try_append(json!("localhost/relative")).unwrap_err();
    assert!(matches!(err, Error::InvalidUrl { .. }));

    // Only the well-formed tasks are queued, so the chunk goes through.
    assert_eq!(curl.pending_len(), 2);
    let bodies = curl.next_chunk(2).await.unwrap().unwrap();
    assert_eq!(bodies, ["0", "1"]);
    assert!(curl.next_chunk(2).await.is_none());
}

#[tokio::test]
async fn test_failure_aborts_chunk_and_stream() {
    let server = numbered_server(2).await;
    let mut tasks = numbered_tasks(&server, 2);
    // Nothing listens on port 9 (discard) on loopback.
    tasks.push(Task::from("http://127.0.0.1:9/unreachable"));
    tasks.push(Task::from(format!("{}/never", server.uri())));

    let mut curl = AsyncCurl::new(tasks).unwrap();
    let results: Vec<_> = curl.run_tasks(2).collect().await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), &["0", "1"]);
    assert!(matches!(results[1], Err(Error::Http(_))));

    // The failed chunk stays pending.
    assert_eq!(curl.completed().len(), 2);
    assert_eq!(curl.pending_len(), 2);
    assert_eq!(
        curl.pending().next().map(Task::url),
        Some("http://127.0.0.1:9/unreachable")
    );
}

#[tokio::test]
async fn test_error_for_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let curl = AsyncCurl::new(Vec::<Task>::new()).unwrap();
    let body = curl.request(&Task::from(server.uri())).await.unwrap();
    assert_eq!(body, "boom");

    let config = CurlConfig {
        error_for_status: true,
        ..Default::default()
    };
    let curl = AsyncCurl::with_config(Vec::<Task>::new(), &config).unwrap();
    let err = curl.request(&Task::from(server.uri())).await.unwrap_err();
    match err {
        Error::Http(e) => assert_eq!(e.status().map(|s| s.as_u16()), Some(500)),
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_per_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let task = Task::from((
        server.uri(),
        RequestOptions::new().with_timeout(Duration::from_millis(50)),
    ));
    let curl = AsyncCurl::new(Vec::<Task>::new()).unwrap();
    match curl.request(&task).await {
        Err(Error::Http(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn test_blocking_chunks() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(numbered_server(5));

    let mut curl = AsyncCurl::new(numbered_tasks(&server, 5)).unwrap();
    let chunks: Vec<_> = curl
        .blocking_chunks(2)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(chunks, vec![vec!["0", "1"], vec!["2", "3"], vec!["4"]]);
    assert_eq!(curl.completed().len(), 5);

    // Verify expectations while the server's runtime is still alive.
    runtime.block_on(server.verify());
}
