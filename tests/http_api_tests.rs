use human_loop::config::HttpSettings;
use human_loop::{
    AwaitOutcome, ControllerConfig, Error, HttpCallbackDispatcher, HumanApiClient, HumanApiServer,
    QueryLifecycleController, QueryRequest, QueryStore, ResponseWaiter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn test_http_settings() -> HttpSettings {
    HttpSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

async fn start_local_stack() -> (Arc<QueryLifecycleController>, HumanApiServer, HumanApiClient) {
    let controller = Arc::new(QueryLifecycleController::local(ControllerConfig::default()));
    let mut server = HumanApiServer::new(Arc::clone(&controller), test_http_settings());
    let addr = server.start().await.unwrap();
    let client =
        HumanApiClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    (controller, server, client)
}

#[tokio::test]
async fn full_query_flow_over_http() {
    let (_controller, mut server, client) = start_local_stack().await;

    // Nothing pending yet
    assert!(client.pending_queries().await.unwrap().is_empty());

    let id = client
        .submit_query(&QueryRequest::new("What is 2+2?").with_context("arithmetic"))
        .await
        .unwrap();

    let pending = client.pending_queries().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].query_id, id);
    assert_eq!(pending[0].question, "What is 2+2?");
    assert_eq!(pending[0].context.as_deref(), Some("arithmetic"));

    // Not answered yet
    assert_eq!(client.check_response(&id).await.unwrap(), None);

    client.respond(&id, "4").await.unwrap();

    assert_eq!(
        client.check_response(&id).await.unwrap(),
        Some("4".to_string())
    );
    assert!(client.pending_queries().await.unwrap().is_empty());

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.pending_queries, 0);
    assert_eq!(health.answered_queries, 1);
    assert_eq!(health.expired_queries, 0);

    server.stop();
}

#[tokio::test]
async fn http_error_mapping() {
    let (_controller, mut server, client) = start_local_stack().await;

    assert!(matches!(
        client.respond("no-such-id", "hello").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        client.check_response("no-such-id").await,
        Err(Error::NotFound(_))
    ));

    let id = client
        .submit_query(&QueryRequest::new("only once"))
        .await
        .unwrap();
    client.respond(&id, "first").await.unwrap();
    assert!(matches!(
        client.respond(&id, "second").await,
        Err(Error::AlreadyResolved)
    ));

    server.stop();
}

#[tokio::test]
async fn http_answer_wakes_blocked_invocation() {
    // The agent blocks on the controller; the human answers over HTTP. The
    // in-process dispatcher carries the wake signal.
    let (controller, mut server, client) = start_local_stack().await;

    let asker = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            controller
                .ask(QueryRequest::new("Proceed with deletion?"))
                .await
        }
    });
    sleep(Duration::from_millis(100)).await;

    let pending = client.pending_queries().await.unwrap();
    assert_eq!(pending.len(), 1);
    client.respond(&pending[0].query_id, "no").await.unwrap();

    let outcome = asker.await.unwrap().unwrap();
    assert_eq!(outcome, AwaitOutcome::Answered("no".to_string()));

    server.stop();
}

#[tokio::test]
async fn callback_round_trip_over_http() {
    // Wire the notify path through a real network hop: the dispatcher POSTs
    // to the server's own /callback endpoint, which resolves the waiter.
    let store = Arc::new(QueryStore::new());
    let waiter = Arc::new(ResponseWaiter::new(Arc::clone(&store)));
    let dispatcher = Arc::new(HttpCallbackDispatcher::new(Duration::from_secs(5)).unwrap());
    let controller = Arc::new(QueryLifecycleController::new(
        store,
        waiter,
        dispatcher,
        ControllerConfig::default(),
    ));

    let mut server = HumanApiServer::new(Arc::clone(&controller), test_http_settings());
    let addr = server.start().await.unwrap();
    let callback_url = format!("http://{}/callback", addr);

    let id = controller
        .submit_query(QueryRequest::new("Over the wire?").with_callback_url(callback_url))
        .await;

    let asker = tokio::spawn({
        let controller = Arc::clone(&controller);
        let id = id.clone();
        async move { controller.await_answer(&id).await }
    });
    sleep(Duration::from_millis(100)).await;

    controller.submit_answer(&id, "loud and clear").await.unwrap();

    let outcome = asker.await.unwrap().unwrap();
    assert_eq!(outcome, AwaitOutcome::Answered("loud and clear".to_string()));

    server.stop();
}

#[tokio::test]
async fn failed_callback_does_not_lose_the_answer() {
    // The callback target is unreachable, so delivery fails; the answer is
    // still accepted and the waiting side picks it up from the store when
    // its own deadline fires.
    let store = Arc::new(QueryStore::new());
    let waiter = Arc::new(ResponseWaiter::new(Arc::clone(&store)));
    let dispatcher = Arc::new(HttpCallbackDispatcher::new(Duration::from_millis(200)).unwrap());
    let controller = Arc::new(QueryLifecycleController::new(
        store,
        waiter,
        dispatcher,
        ControllerConfig {
            answer_timeout: Duration::from_millis(500),
        },
    ));

    let id = controller
        .submit_query(
            QueryRequest::new("Anyone home?")
                // Nothing listens here
                .with_callback_url("http://127.0.0.1:9/callback"),
        )
        .await;

    let asker = tokio::spawn({
        let controller = Arc::clone(&controller);
        let id = id.clone();
        async move { controller.await_answer(&id).await }
    });
    sleep(Duration::from_millis(50)).await;

    // Accepted even though the notification cannot be delivered
    controller.submit_answer(&id, "recorded").await.unwrap();

    let outcome = asker.await.unwrap().unwrap();
    assert_eq!(outcome, AwaitOutcome::Answered("recorded".to_string()));
}

#[tokio::test]
async fn poll_based_wait_over_http() {
    let (_controller, mut server, client) = start_local_stack().await;

    let id = client
        .submit_query(&QueryRequest::new("Poll me"))
        .await
        .unwrap();

    let poller = tokio::spawn({
        let client = client.clone();
        let id = id.clone();
        async move {
            client
                .wait_for_response(&id, Duration::from_secs(5), Duration::from_millis(50))
                .await
        }
    });
    sleep(Duration::from_millis(150)).await;

    client.respond(&id, "polled").await.unwrap();

    let outcome = poller.await.unwrap().unwrap();
    assert_eq!(outcome, AwaitOutcome::Answered("polled".to_string()));

    // And the timeout path
    let unanswered = client
        .submit_query(&QueryRequest::new("Nobody answers"))
        .await
        .unwrap();
    let outcome = client
        .wait_for_response(&unanswered, Duration::from_millis(200), Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(outcome, AwaitOutcome::TimedOut);

    server.stop();
}
