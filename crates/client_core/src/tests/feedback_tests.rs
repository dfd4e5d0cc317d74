use super::*;
use crate::{
    notify::{ChannelNotifier, Notification},
    optimistic::{MutationOutcome, DEFAULT_NETWORK_ERROR, DEFAULT_UPSERT_FAILED},
    store::MemoryStore,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    routing::{delete, post},
    Json, Router,
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Received {
    Create(CreateFeedbackRequest),
    Remove(RemoveFeedbackQuery),
}

#[derive(Clone, Copy)]
enum Reply {
    Ok,
    Json(StatusCode, &'static str),
    Html(StatusCode),
}

#[derive(Clone)]
struct FeedbackServerState {
    received: Arc<Mutex<Vec<Received>>>,
    reply: Reply,
}

fn reply(reply: Reply) -> AxumResponse {
    match reply {
        Reply::Ok => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
        Reply::Json(status, raw) => {
            let body: serde_json::Value = serde_json::from_str(raw).expect("reply json");
            (status, Json(body)).into_response()
        }
        Reply::Html(status) => (status, "<html>bad gateway</html>").into_response(),
    }
}

async fn handle_create(
    State(state): State<FeedbackServerState>,
    Json(request): Json<CreateFeedbackRequest>,
) -> AxumResponse {
    state.received.lock().await.push(Received::Create(request));
    reply(state.reply)
}

async fn handle_remove(
    State(state): State<FeedbackServerState>,
    Query(query): Query<RemoveFeedbackQuery>,
) -> AxumResponse {
    state.received.lock().await.push(Received::Remove(query));
    reply(state.reply)
}

async fn spawn_feedback_server(reply: Reply) -> (String, Arc<Mutex<Vec<Received>>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = FeedbackServerState {
        received: Arc::new(Mutex::new(Vec::new())),
        reply,
    };
    let received = state.received.clone();
    let app = Router::new()
        .route(CREATE_FEEDBACK_PATH, post(handle_create))
        .route(REMOVE_FEEDBACK_PATH, delete(handle_remove))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), received)
}

fn controller_for(
    server_url: &str,
    entries: impl IntoIterator<Item = (MessageId, FeedbackValue)>,
) -> (
    FeedbackController,
    Arc<MemoryStore<MessageId, FeedbackValue>>,
    mpsc::UnboundedReceiver<Notification>,
) {
    let store = Arc::new(MemoryStore::from_entries(entries));
    let (notifier, notifications) = ChannelNotifier::new();
    let settings = ClientSettings {
        server_url: server_url.to_string(),
        ..ClientSettings::default()
    };
    let controller =
        FeedbackController::from_settings(&settings, store.clone(), Arc::new(notifier))
            .expect("controller");
    (controller, store, notifications)
}

#[tokio::test]
async fn submit_posts_feedback_with_extra_fields() {
    let (server_url, received) = spawn_feedback_server(Reply::Ok).await;
    let (controller, store, mut notifications) = controller_for(&server_url, [(MessageId(7), None)]);

    let outcome = controller
        .submit(
            MessageId(7),
            FeedbackType::Dislike,
            Some(FeedbackExtra {
                feedback_text: Some("cited the wrong doc".into()),
                predefined_feedback: Some("Retrieved documents were irrelevant".into()),
            }),
        )
        .await;

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(store.get(&MessageId(7)), Some(Some(FeedbackType::Dislike)));
    assert!(notifications.try_recv().is_err());
    assert_eq!(
        *received.lock().await,
        vec![Received::Create(CreateFeedbackRequest {
            chat_message_id: MessageId(7),
            is_positive: false,
            feedback_text: Some("cited the wrong doc".into()),
            predefined_feedback: Some("Retrieved documents were irrelevant".into()),
        })]
    );
}

#[tokio::test]
async fn forbidden_removal_rolls_back_and_surfaces_detail() {
    let (server_url, received) =
        spawn_feedback_server(Reply::Json(StatusCode::FORBIDDEN, r#"{"detail":"Forbidden"}"#))
            .await;
    let (controller, store, mut notifications) =
        controller_for(&server_url, [(MessageId(42), Some(FeedbackType::Like))]);

    let handle = controller.remove(MessageId(42));
    assert_eq!(store.get(&MessageId(42)), Some(None));

    assert_eq!(
        handle.await,
        MutationOutcome::RolledBack {
            message: "Forbidden".into()
        }
    );
    assert_eq!(store.get(&MessageId(42)), Some(Some(FeedbackType::Like)));
    assert_eq!(
        notifications.try_recv().expect("notification"),
        Notification::error("Forbidden")
    );
    assert!(notifications.try_recv().is_err());
    assert_eq!(
        *received.lock().await,
        vec![Received::Remove(RemoveFeedbackQuery {
            chat_message_id: 42
        })]
    );
}

#[tokio::test]
async fn message_field_is_used_when_detail_absent() {
    let (server_url, _) = spawn_feedback_server(Reply::Json(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"message":"feedback text too long"}"#,
    ))
    .await;
    let (controller, store, _notifications) = controller_for(&server_url, [(MessageId(3), None)]);

    let outcome = controller
        .submit(MessageId(3), FeedbackType::Like, Some(FeedbackExtra::text("x")))
        .await;

    assert_eq!(
        outcome,
        MutationOutcome::RolledBack {
            message: "feedback text too long".into()
        }
    );
    assert_eq!(store.get(&MessageId(3)), Some(None));
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_default_message() {
    let (server_url, _) = spawn_feedback_server(Reply::Html(StatusCode::BAD_GATEWAY)).await;
    let (controller, store, mut notifications) = controller_for(&server_url, [(MessageId(5), None)]);

    let outcome = controller.submit(MessageId(5), FeedbackType::Like, None).await;

    assert_eq!(
        outcome,
        MutationOutcome::RolledBack {
            message: DEFAULT_UPSERT_FAILED.into()
        }
    );
    assert_eq!(store.get(&MessageId(5)), Some(None));
    assert_eq!(
        notifications.try_recv().expect("notification").message,
        DEFAULT_UPSERT_FAILED
    );
}

#[tokio::test]
async fn unreachable_server_reports_network_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let (controller, store, mut notifications) = controller_for(
        &format!("http://{addr}"),
        [(MessageId(9), Some(FeedbackType::Dislike))],
    );

    let outcome = controller.submit(MessageId(9), FeedbackType::Like, None).await;

    assert_eq!(
        outcome,
        MutationOutcome::RolledBack {
            message: DEFAULT_NETWORK_ERROR.into()
        }
    );
    assert_eq!(store.get(&MessageId(9)), Some(Some(FeedbackType::Dislike)));
    assert_eq!(
        notifications.try_recv().expect("notification"),
        Notification::error(DEFAULT_NETWORK_ERROR)
    );
}

#[tokio::test]
async fn toggle_clears_active_rating_and_switches_otherwise() {
    let (server_url, received) = spawn_feedback_server(Reply::Ok).await;
    let (controller, store, _notifications) =
        controller_for(&server_url, [(MessageId(1), Some(FeedbackType::Like))]);

    assert!(controller
        .toggle(MessageId(1), FeedbackType::Like, None)
        .await
        .is_committed());
    assert_eq!(controller.current(MessageId(1)), Some(None));

    assert!(controller
        .toggle(MessageId(1), FeedbackType::Dislike, None)
        .await
        .is_committed());
    assert_eq!(store.get(&MessageId(1)), Some(Some(FeedbackType::Dislike)));

    assert_eq!(
        *received.lock().await,
        vec![
            Received::Remove(RemoveFeedbackQuery { chat_message_id: 1 }),
            Received::Create(CreateFeedbackRequest::new(
                MessageId(1),
                FeedbackType::Dislike
            )),
        ]
    );
}

#[tokio::test]
async fn unknown_message_is_skipped_without_request() {
    let (server_url, received) = spawn_feedback_server(Reply::Ok).await;
    let (controller, _store, _notifications) = controller_for(&server_url, []);

    let outcome = controller.submit(MessageId(404), FeedbackType::Like, None).await;

    assert_eq!(outcome, MutationOutcome::Skipped);
    assert!(received.lock().await.is_empty());
}

#[test]
fn endpoints_keep_server_path_prefix() {
    let remote = HttpFeedbackRemote::new("https://chat.example.com/api", None).expect("remote");
    assert_eq!(
        remote.endpoint(CREATE_FEEDBACK_PATH).expect("url").as_str(),
        "https://chat.example.com/api/chat/create-chat-message-feedback"
    );

    let remote = HttpFeedbackRemote::new("http://127.0.0.1:8080/", None).expect("remote");
    assert_eq!(
        remote.endpoint(REMOVE_FEEDBACK_PATH).expect("url").as_str(),
        "http://127.0.0.1:8080/chat/remove-chat-message-feedback"
    );
}

#[test]
fn invalid_server_url_is_rejected() {
    assert!(HttpFeedbackRemote::new("not a url", None).is_err());
}
