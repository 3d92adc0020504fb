use std::sync::Arc;
use std::time::Duration;

use deckgate::client::{ClientError, ProjectsClient};
use deckgate::gate::{GateConfig, StatusGate};
use deckgate::poller::{PollDecision, PollError, Poller};
use deckgate::project::{
    DEFAULT_REVIEW_STATUS, ProjectKey, ProjectRecord, RecordPatch, ReviewQuestion, StatusSet,
};
use deckgate::server::{AppState, build_router};
use deckgate::store::{InMemoryStore, ProjectStore};
use deckgate::webhook::WebhookClient;
use deckgate::wire::UpdateRequest;

/// Start the HTTP surface on an ephemeral port and return its base URL.
async fn spawn_server(store: Arc<InMemoryStore>) -> String {
    let gate = StatusGate::new(
        GateConfig::default(),
        store,
        Arc::new(WebhookClient::new().unwrap()),
    );
    let app = build_router(Arc::new(AppState { gate }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn key() -> ProjectKey {
    ProjectKey::new("user-1", "proj-1")
}

fn question(id: &str) -> ReviewQuestion {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "type": "select",
        "label": "Who is this presentation for?",
        "options": ["Hackathon judges", "Team members"],
        "required": true,
        "userAnswer": ""
    }))
    .unwrap()
}

#[tokio::test]
async fn poller_routes_to_questions_then_answers_flow_through() {
    let mut record = ProjectRecord::new(&key(), "action needed");
    record.review_and_refine = vec![question("targetAudience")];
    let store = Arc::new(InMemoryStore::with_records([record]));
    let base_url = spawn_server(store.clone()).await;

    let poller = Poller::new(
        ProjectsClient::new(&base_url, "user-1").unwrap(),
        Duration::from_millis(10),
        StatusSet::default_completed(),
    )
    .with_max_attempts(Some(5));

    let questions = match poller.run("proj-1").await.unwrap() {
        PollDecision::AnswerQuestions(questions) => questions,
        other => panic!("expected questions, got {other:?}"),
    };
    assert_eq!(questions[0].id, "targetAudience");
    assert!(questions[0].required());
    assert_eq!(questions[0].options(), vec!["Hackathon judges", "Team members"]);

    let answered: Vec<ReviewQuestion> = questions
        .into_iter()
        .map(|mut q| {
            q.extra.insert("userAnswer".into(), "Hackathon judges".into());
            q
        })
        .collect();
    let client = ProjectsClient::new(&base_url, "user-1").unwrap();
    let response = client
        .submit(
            "proj-1",
            &UpdateRequest {
                review_and_refine: Some(answered),
                status: None,
            },
        )
        .await
        .unwrap();
    assert!(response.ok);
    assert!(response.updated.review_and_refine);
    assert_eq!(
        response.updated.status.as_deref(),
        Some(DEFAULT_REVIEW_STATUS)
    );
    assert!(!response.forwarded_to_n8n);
    assert_eq!(response.method, "POST");

    let record = client.fetch("proj-1").await.unwrap();
    assert_eq!(record.status, DEFAULT_REVIEW_STATUS);
    assert!(record.review_and_refine.iter().all(ReviewQuestion::is_answered));
}

#[tokio::test]
async fn poller_waits_for_completion() {
    let store = Arc::new(InMemoryStore::with_records([ProjectRecord::new(
        &key(),
        "generating presentation",
    )]));
    let base_url = spawn_server(store.clone()).await;

    let finisher = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store
                .update_existing(
                    &key(),
                    &RecordPatch {
                        status: Some("complete".into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        })
    };

    let poller = Poller::new(
        ProjectsClient::new(&base_url, "user-1").unwrap(),
        Duration::from_millis(10),
        StatusSet::default_completed(),
    )
    .with_max_attempts(Some(200));
    let decision = poller.run("proj-1").await.unwrap();
    assert_eq!(decision, PollDecision::Completed { download_url: None });
    finisher.await.unwrap();
}

#[tokio::test]
async fn poller_gives_up_on_missing_project() {
    let base_url = spawn_server(Arc::new(InMemoryStore::new())).await;
    let poller = Poller::new(
        ProjectsClient::new(&base_url, "user-1").unwrap(),
        Duration::from_millis(5),
        StatusSet::default_completed(),
    )
    .with_max_attempts(Some(3));

    match poller.run("proj-1").await {
        Err(PollError::GaveUp {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.unwrap().contains("404"));
        }
        other => panic!("expected GaveUp, got {other:?}"),
    }
}

#[tokio::test]
async fn client_surfaces_rejections() {
    let store = Arc::new(InMemoryStore::with_records([ProjectRecord::new(
        &key(),
        "processing",
    )]));
    let base_url = spawn_server(store).await;
    let client = ProjectsClient::new(&base_url, "user-1").unwrap();

    let err = client
        .submit(
            "proj-1",
            &UpdateRequest {
                status: Some("shipped".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("Invalid status 'shipped'"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}
