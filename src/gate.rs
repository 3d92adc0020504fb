//! The status transition gate.
//!
//! One call to [`StatusGate::apply`] validates a partial update, writes it
//! with a single conditional update, and, when review answers were part of
//! the update, forwards the freshly read record to the workflow webhook.
//! Validation is split out into [`StatusGate::plan`] so it can run (and be
//! tested) without touching the store.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::GateError;
use crate::project::{
    DEFAULT_REVIEW_STATUS, ProjectKey, ProjectRecord, RecordPatch, ReviewQuestion, StatusSet,
};
use crate::store::ProjectStore;
use crate::webhook::RecordForwarder;

/// Where forwarded records go. Records of `test_account_id` are sent to
/// `test_url` instead of `url`; nothing is forwarded when `url` is unset.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebhookRouting {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub test_url: Option<String>,
    #[serde(default)]
    pub test_account_id: Option<String>,
}

impl WebhookRouting {
    /// Resolve the webhook for `user_id`, or `None` if forwarding is off.
    pub fn target_for(&self, user_id: &str) -> Result<Option<&str>, GateError> {
        let Some(primary) = non_blank(self.url.as_deref()) else {
            return Ok(None);
        };
        if non_blank(self.test_account_id.as_deref()) == Some(user_id) {
            return non_blank(self.test_url.as_deref())
                .map(Some)
                .ok_or_else(|| GateError::Misconfigured("test webhook URL not set".into()));
        }
        Ok(Some(primary))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Gate behaviour, injected at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GateConfig {
    #[serde(default = "StatusSet::default_allowed")]
    pub allowed_statuses: StatusSet,
    /// Status written when answers arrive without one. Empty disables it.
    #[serde(default = "default_review_status")]
    pub default_review_status: String,
    #[serde(default)]
    pub webhook: WebhookRouting,
}

fn default_review_status() -> String {
    DEFAULT_REVIEW_STATUS.to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            allowed_statuses: StatusSet::default_allowed(),
            default_review_status: default_review_status(),
            webhook: WebhookRouting::default(),
        }
    }
}

/// A validated update, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub review_and_refine: Option<Vec<ReviewQuestion>>,
    pub status: Option<String>,
}

impl UpdatePlan {
    pub fn has_review(&self) -> bool {
        self.review_and_refine.is_some()
    }

    fn patch(&self) -> RecordPatch {
        RecordPatch {
            review_and_refine: self.review_and_refine.clone(),
            status: self.status.clone(),
        }
    }
}

/// What a successful [`StatusGate::apply`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub project_id: String,
    pub review_updated: bool,
    pub status: Option<String>,
    pub forwarded: bool,
}

pub struct StatusGate {
    config: GateConfig,
    store: Arc<dyn ProjectStore>,
    forwarder: Arc<dyn RecordForwarder>,
}

impl StatusGate {
    pub fn new(
        config: GateConfig,
        store: Arc<dyn ProjectStore>,
        forwarder: Arc<dyn RecordForwarder>,
    ) -> Self {
        Self {
            config,
            store,
            forwarder,
        }
    }

    /// Validate a raw request body. Unparseable JSON counts as `{}`.
    pub fn plan(&self, body: &[u8]) -> Result<UpdatePlan, GateError> {
        let value = serde_json::from_slice(body).unwrap_or(Value::Null);
        self.plan_value(&value)
    }

    pub fn plan_value(&self, body: &Value) -> Result<UpdatePlan, GateError> {
        let review = body.get("reviewAndRefine").and_then(Value::as_array);
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if review.is_none() && status.is_none() {
            return Err(GateError::EmptyUpdate);
        }

        let review_and_refine = review.map(|items| parse_questions(items)).transpose()?;

        if let Some(status) = status
            && !self.config.allowed_statuses.contains(status)
        {
            return Err(GateError::InvalidStatus {
                status: status.to_string(),
                allowed: self.config.allowed_statuses.to_vec(),
            });
        }

        let status = match status {
            Some(status) => Some(status.to_string()),
            None if review_and_refine.is_some() => {
                non_blank(Some(self.config.default_review_status.as_str())).map(str::to_string)
            }
            None => None,
        };

        Ok(UpdatePlan {
            review_and_refine,
            status,
        })
    }

    /// Write a plan with one conditional update.
    pub async fn commit(
        &self,
        key: &ProjectKey,
        plan: &UpdatePlan,
    ) -> Result<ProjectRecord, GateError> {
        let record = self.store.update_existing(key, &plan.patch()).await?;
        info!(
            %key,
            status = %record.status,
            questions = record.review_and_refine.len(),
            "project updated"
        );
        Ok(record)
    }

    /// Validate, write, and forward. The write is never undone, even when
    /// the webhook call fails afterwards.
    pub async fn apply(&self, key: &ProjectKey, body: &[u8]) -> Result<UpdateOutcome, GateError> {
        let plan = self.plan(body).inspect_err(|e| {
            warn!(%key, error = %e, "update rejected");
        })?;

        let target = if plan.has_review() {
            self.config.webhook.target_for(&key.user_id)?
        } else {
            None
        };

        self.commit(key, &plan).await?;

        let forwarded = match target {
            Some(url) => {
                self.forward(key, url).await?;
                true
            }
            None => false,
        };

        Ok(UpdateOutcome {
            project_id: key.project_id.clone(),
            review_updated: plan.has_review(),
            status: plan.status,
            forwarded,
        })
    }

    /// Consistent read of the record, as served to the client poller.
    pub async fn fetch(&self, key: &ProjectKey) -> Result<ProjectRecord, GateError> {
        self.store.get(key).await?.ok_or(GateError::NotFound)
    }

    async fn forward(&self, key: &ProjectKey, url: &str) -> Result<(), GateError> {
        let record = self
            .store
            .get(key)
            .await?
            .ok_or(GateError::NotFoundAfterUpdate)?;

        self.forwarder.forward(url, &record).await.map_err(|e| {
            warn!(%key, error = %e, "webhook forward failed");
            GateError::from(e)
        })?;
        info!(%key, "record forwarded to workflow webhook");
        Ok(())
    }
}

fn parse_questions(items: &[Value]) -> Result<Vec<ReviewQuestion>, GateError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let malformed = |reason: String| GateError::MalformedQuestion { index, reason };
            let fields = item
                .as_object()
                .ok_or_else(|| malformed("not an object".into()))?;
            for name in ["id", "type", "label"] {
                if !fields.get(name).is_some_and(Value::is_string) {
                    return Err(malformed(format!("`{name}` must be a string")));
                }
            }
            serde_json::from_value(item.clone()).map_err(|e| malformed(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::webhook::WebhookError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every forward and answers with a fixed status.
    struct MockForwarder {
        status: u16,
        calls: Mutex<Vec<(String, ProjectRecord)>>,
    }

    impl MockForwarder {
        fn answering(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, ProjectRecord)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordForwarder for MockForwarder {
        async fn forward(&self, url: &str, record: &ProjectRecord) -> Result<(), WebhookError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), record.clone()));
            if (200..300).contains(&self.status) {
                Ok(())
            } else {
                Err(WebhookError::Rejected {
                    status: self.status,
                    body: "mock failure".into(),
                })
            }
        }
    }

    fn key() -> ProjectKey {
        ProjectKey::new("user-1", "proj-1")
    }

    fn routing() -> WebhookRouting {
        WebhookRouting {
            url: Some("https://hooks.example/phase2".into()),
            test_url: Some("https://hooks.example/phase2-test".into()),
            test_account_id: Some("tester".into()),
        }
    }

    fn gate_with(
        config: GateConfig,
        forwarder: Arc<MockForwarder>,
    ) -> (StatusGate, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::with_records([
            ProjectRecord::new(&key(), "processing"),
            ProjectRecord::new(&ProjectKey::new("tester", "proj-1"), "processing"),
        ]));
        let gate = StatusGate::new(config, store.clone(), forwarder);
        (gate, store)
    }

    fn gate() -> StatusGate {
        gate_with(GateConfig::default(), MockForwarder::answering(200)).0
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn plan_rejects_empty_update() {
        let gate = gate();
        assert!(matches!(gate.plan(b"{}"), Err(GateError::EmptyUpdate)));
        assert!(matches!(gate.plan(b"not json"), Err(GateError::EmptyUpdate)));
        assert!(matches!(
            gate.plan(&body(json!({"status": "   "}))),
            Err(GateError::EmptyUpdate)
        ));
        assert!(matches!(
            gate.plan(&body(json!({"status": 7, "reviewAndRefine": "nope"}))),
            Err(GateError::EmptyUpdate)
        ));
    }

    #[test]
    fn plan_trims_and_checks_status() {
        let gate = gate();
        let plan = gate.plan(&body(json!({"status": "  ready  "}))).unwrap();
        assert_eq!(plan.status.as_deref(), Some("ready"));
        assert!(plan.review_and_refine.is_none());

        match gate.plan(&body(json!({"status": "shipped"}))) {
            Err(GateError::InvalidStatus { status, allowed }) => {
                assert_eq!(status, "shipped");
                assert_eq!(allowed.len(), 10);
                assert_eq!(allowed[0], "uploading");
            }
            other => panic!("expected InvalidStatus, got {other:?}"),
        }
    }

    #[test]
    fn plan_rejects_malformed_questions() {
        let gate = gate();
        for bad in [
            json!([{"id": "a", "type": "select"}]),
            json!([{"id": 1, "type": "select", "label": "L"}]),
            json!([{"id": "a", "type": "select", "label": "L"}, null]),
            json!(["just a string"]),
        ] {
            let result = gate.plan(&body(json!({"reviewAndRefine": bad})));
            assert!(
                matches!(result, Err(GateError::MalformedQuestion { .. })),
                "{result:?}"
            );
        }
    }

    #[test]
    fn plan_accepts_loosely_typed_optional_attributes() {
        let gate = gate();
        for question in [
            json!({"id": "a", "type": "select", "label": "L", "required": null}),
            json!({"id": "a", "type": "select", "label": "L", "required": "true"}),
            json!({"id": "a", "type": "multi", "label": "L", "userAnswer": ["x", "y"]}),
            json!({"id": "a", "type": "select", "label": "L", "options": [{"v": 1}]}),
            json!({"id": "a", "type": "select", "label": "L", "options": [1, 2]}),
        ] {
            let plan = gate
                .plan(&body(json!({"reviewAndRefine": [question.clone()]})))
                .unwrap();
            let stored = serde_json::to_value(&plan.review_and_refine.unwrap()[0]).unwrap();
            assert_eq!(stored, question);
        }
    }

    #[test]
    fn plan_reports_malformed_index() {
        let gate = gate();
        let result = gate.plan(&body(json!({"reviewAndRefine": [
            {"id": "a", "type": "select", "label": "L"},
            {"id": "b", "type": "select"}
        ]})));
        assert!(matches!(result, Err(GateError::MalformedQuestion { index: 1, .. })));
    }

    #[test]
    fn plan_checks_questions_before_status() {
        let gate = gate();
        let result = gate.plan(&body(json!({
            "reviewAndRefine": [{"id": "a"}],
            "status": "shipped"
        })));
        assert!(matches!(result, Err(GateError::MalformedQuestion { .. })));
    }

    #[test]
    fn plan_substitutes_default_status_for_answers() {
        let gate = gate();
        let plan = gate
            .plan(&body(json!({"reviewAndRefine": [{"id": "a", "type": "select", "label": "L"}]})))
            .unwrap();
        assert_eq!(plan.status.as_deref(), Some(DEFAULT_REVIEW_STATUS));

        let plan = gate
            .plan(&body(json!({"reviewAndRefine": [], "status": "refining"})))
            .unwrap();
        assert_eq!(plan.status.as_deref(), Some("refining"));
        assert_eq!(plan.review_and_refine, Some(vec![]));
    }

    #[test]
    fn plan_without_default_status_leaves_status_alone() {
        let config = GateConfig {
            default_review_status: String::new(),
            ..Default::default()
        };
        let (gate, _) = gate_with(config, MockForwarder::answering(200));
        let plan = gate.plan(&body(json!({"reviewAndRefine": []}))).unwrap();
        assert!(plan.status.is_none());
    }

    #[test]
    fn routing_selects_test_url_for_test_account() {
        let routing = routing();
        assert_eq!(
            routing.target_for("user-1").unwrap(),
            Some("https://hooks.example/phase2")
        );
        assert_eq!(
            routing.target_for("tester").unwrap(),
            Some("https://hooks.example/phase2-test")
        );
    }

    #[test]
    fn routing_without_primary_url_is_disabled() {
        let routing = WebhookRouting {
            url: None,
            ..routing()
        };
        assert_eq!(routing.target_for("tester").unwrap(), None);
        assert_eq!(WebhookRouting::default().target_for("x").unwrap(), None);
    }

    #[test]
    fn routing_missing_test_url_is_misconfiguration() {
        let routing = WebhookRouting {
            test_url: Some(" ".into()),
            ..routing()
        };
        assert!(matches!(
            routing.target_for("tester"),
            Err(GateError::Misconfigured(_))
        ));
    }

    #[tokio::test]
    async fn status_only_update_keeps_questions_and_skips_forward() {
        let forwarder = MockForwarder::answering(200);
        let config = GateConfig {
            webhook: routing(),
            ..Default::default()
        };
        let (gate, store) = gate_with(config, forwarder.clone());
        store
            .update_existing(
                &key(),
                &RecordPatch {
                    review_and_refine: Some(vec![ReviewQuestion::new("a", "select", "A")]),
                    status: None,
                },
            )
            .await
            .unwrap();

        let outcome = gate
            .apply(&key(), &body(json!({"status": "ready"})))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome {
                project_id: "proj-1".into(),
                review_updated: false,
                status: Some("ready".into()),
                forwarded: false,
            }
        );
        let record = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(record.status, "ready");
        assert_eq!(record.review_and_refine.len(), 1);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn answers_are_persisted_and_forwarded() {
        let forwarder = MockForwarder::answering(200);
        let config = GateConfig {
            webhook: routing(),
            ..Default::default()
        };
        let (gate, store) = gate_with(config, forwarder.clone());
        let before = store.get(&key()).await.unwrap().unwrap();

        let outcome = gate
            .apply(
                &key(),
                &body(json!({"reviewAndRefine": [
                    {"id": "a", "type": "select", "label": "L", "userAnswer": "Judges"}
                ]})),
            )
            .await
            .unwrap();

        assert!(outcome.forwarded);
        assert!(outcome.review_updated);
        assert_eq!(outcome.status.as_deref(), Some(DEFAULT_REVIEW_STATUS));

        let record = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(record.status, DEFAULT_REVIEW_STATUS);
        assert!(record.updated_at > before.updated_at);

        let calls = forwarder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://hooks.example/phase2");
        assert_eq!(calls[0].1, record);
    }

    #[tokio::test]
    async fn questions_are_stored_and_forwarded_verbatim() {
        let forwarder = MockForwarder::answering(200);
        let config = GateConfig {
            webhook: routing(),
            ..Default::default()
        };
        let (gate, store) = gate_with(config, forwarder.clone());
        let questions = json!([
            {"id": "a", "type": "longText", "label": "L"},
            {"id": "b", "type": "select", "label": "M", "required": "yes", "userAnswer": 3}
        ]);

        gate.apply(&key(), &body(json!({"reviewAndRefine": questions.clone()})))
            .await
            .unwrap();

        let record = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&record.review_and_refine).unwrap(),
            questions
        );
        let forwarded = serde_json::to_value(&forwarder.calls()[0].1).unwrap();
        assert_eq!(forwarded["reviewAndRefine"], questions);
    }

    #[tokio::test]
    async fn answers_without_webhook_are_not_forwarded() {
        let forwarder = MockForwarder::answering(200);
        let (gate, _) = gate_with(GateConfig::default(), forwarder.clone());
        let outcome = gate
            .apply(&key(), &body(json!({"reviewAndRefine": []})))
            .await
            .unwrap();
        assert!(!outcome.forwarded);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_forward_keeps_the_write() {
        let forwarder = MockForwarder::answering(500);
        let config = GateConfig {
            webhook: routing(),
            ..Default::default()
        };
        let (gate, store) = gate_with(config, forwarder);

        let err = gate
            .apply(
                &key(),
                &body(json!({"reviewAndRefine": [{"id": "a", "type": "t", "label": "L"}]})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Upstream { status: 500, .. }));

        let record = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(record.status, DEFAULT_REVIEW_STATUS);
        assert_eq!(record.review_and_refine[0].id, "a");
    }

    #[tokio::test]
    async fn missing_record_is_not_found_and_not_created() {
        let forwarder = MockForwarder::answering(200);
        let config = GateConfig {
            webhook: routing(),
            ..Default::default()
        };
        let (gate, store) = gate_with(config, forwarder.clone());
        let missing = ProjectKey::new("user-1", "nope");

        let err = gate
            .apply(&missing, &body(json!({"reviewAndRefine": []})))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound));
        assert_eq!(store.len().await, 2);
        assert!(store.get(&missing).await.unwrap().is_none());
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_input_performs_no_write() {
        let (gate, store) = gate_with(GateConfig::default(), MockForwarder::answering(200));
        let before = store.get(&key()).await.unwrap().unwrap();

        for bad in [
            json!({}),
            json!({"status": "shipped"}),
            json!({"reviewAndRefine": [{"id": "a"}]}),
        ] {
            assert!(gate.apply(&key(), &body(bad)).await.is_err());
        }
        assert_eq!(store.get(&key()).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_account_without_test_url_fails_before_writing() {
        let config = GateConfig {
            webhook: WebhookRouting {
                test_url: None,
                ..routing()
            },
            ..Default::default()
        };
        let (gate, store) = gate_with(config, MockForwarder::answering(200));
        let tester = ProjectKey::new("tester", "proj-1");
        let before = store.get(&tester).await.unwrap().unwrap();

        let err = gate
            .apply(&tester, &body(json!({"reviewAndRefine": []})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(store.get(&tester).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_account_is_forwarded_to_test_url() {
        let forwarder = MockForwarder::answering(200);
        let config = GateConfig {
            webhook: routing(),
            ..Default::default()
        };
        let (gate, _) = gate_with(config, forwarder.clone());

        gate.apply(
            &ProjectKey::new("tester", "proj-1"),
            &body(json!({"reviewAndRefine": []})),
        )
        .await
        .unwrap();
        assert_eq!(forwarder.calls()[0].0, "https://hooks.example/phase2-test");
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let gate = gate();
        assert!(matches!(
            gate.fetch(&ProjectKey::new("user-1", "nope")).await,
            Err(GateError::NotFound)
        ));
        assert_eq!(gate.fetch(&key()).await.unwrap().status, "processing");
    }
}
