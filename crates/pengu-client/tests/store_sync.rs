//! End-to-end store behavior against a scripted in-memory gateway.

use pengu_client::gateway::{Gateway, GatewayError};
use pengu_client::models::{
    MilestoneStatus, OrderStatus, QuoteStatus, RequestStatus, Role, WithdrawalStatus,
};
use pengu_client::notice::{self, Notice, NoticeLevel};
use pengu_client::{ServerEvent, SessionFile, Store};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

type Responder = Box<dyn Fn(Option<Value>) -> Result<Value, GatewayError> + Send + Sync>;

/// Scripted gateway: responses keyed by "METHOD path", every call recorded.
#[derive(Default)]
struct MockGateway {
    responders: Mutex<HashMap<String, Responder>>,
    calls: Mutex<Vec<String>>,
    token: Mutex<Option<String>>,
}

impl MockGateway {
    fn on(&self, key: &str, value: Value) {
        self.on_fn(key, move |_| Ok(value.clone()));
    }

    fn on_fn(
        &self,
        key: &str,
        responder: impl Fn(Option<Value>) -> Result<Value, GatewayError> + Send + Sync + 'static,
    ) {
        self.responders
            .lock()
            .unwrap()
            .insert(key.to_string(), Box::new(responder));
    }

    fn fail(&self, key: &str, status: u16, message: &str) {
        let message = message.to_string();
        self.on_fn(key, move |_| {
            Err(GatewayError::Api {
                status,
                message: message.clone(),
            })
        });
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn dispatch(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value, GatewayError> {
        let key = format!("{method} {path}");
        self.calls.lock().unwrap().push(key.clone());
        let responders = self.responders.lock().unwrap();
        match responders.get(&key) {
            Some(responder) => responder(body),
            None => Err(GatewayError::Api {
                status: 404,
                message: String::new(),
            }),
        }
    }
}

impl Gateway for MockGateway {
    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        self.dispatch("GET", path, None)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        self.dispatch("POST", path, Some(body))
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        self.dispatch("PUT", path, Some(body))
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        self.dispatch("PATCH", path, Some(body))
    }

    async fn delete(&self, path: &str) -> Result<Value, GatewayError> {
        self.dispatch("DELETE", path, None)
    }
}

struct Harness {
    store: Store<MockGateway>,
    notices: UnboundedReceiver<Notice>,
    session_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(gateway: MockGateway) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");
    let (tx, notices) = notice::channel();
    Harness {
        store: Store::new(gateway, SessionFile::at(&session_path), tx),
        notices,
        session_path,
        _dir: dir,
    }
}

impl Harness {
    fn drain_notices(&mut self) -> Vec<Notice> {
        let mut drained = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            drained.push(notice);
        }
        drained
    }
}

fn student(id: &str, credits: f64) -> Value {
    json!({
        "_id": id,
        "email": format!("{id}@pengu.app"),
        "role": "student",
        "pengu_credits": credits,
        "token": "jwt-1",
    })
}

fn admin(id: &str) -> Value {
    json!({
        "_id": id,
        "email": format!("{id}@pengu.app"),
        "role": "admin",
        "token": "jwt-admin",
    })
}

#[tokio::test]
async fn bulk_load_initializes_despite_individual_failures() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on("GET /experts", json!([{"_id": "e1", "name": "Prof"}]));
    gateway.on("GET /carousel", json!([]));
    gateway.on(
        "GET /requests/mine",
        json!([{"_id": "r1", "title": "Essay help", "status": "SUBMITTED"}]),
    );
    gateway.fail("GET /orders/mine", 500, "orders backend down");
    // every other endpoint 404s

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    assert!(h.store.is_initialized);
    assert_eq!(h.store.experts.len(), 1);
    assert_eq!(h.store.requests.len(), 1);
    assert!(h.store.orders.is_empty());
}

#[tokio::test]
async fn login_failure_surfaces_server_message_and_changes_nothing() {
    let gateway = MockGateway::default();
    gateway.fail("POST /auth/login", 401, "Invalid credentials");

    let mut h = harness(gateway);
    assert!(!h.store.login("u1@pengu.app", "wrong").await);

    assert!(h.store.current_user.is_none());
    assert!(!h.session_path.exists());
    let notices = h.drain_notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.message == "Invalid credentials"));
}

#[tokio::test]
async fn logout_is_idempotent_and_clears_the_session_file() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);
    assert!(h.session_path.exists());

    h.store.logout();
    assert!(h.store.current_user.is_none());
    assert!(!h.session_path.exists());

    h.store.logout();
    assert!(h.store.current_user.is_none());
    assert!(!h.session_path.exists());
}

#[tokio::test]
async fn session_is_restored_from_disk_at_construction() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 15.0));

    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");
    {
        let (tx, _rx) = notice::channel();
        let mut store = Store::new(gateway, SessionFile::at(&session_path), tx);
        assert!(store.login("u1@pengu.app", "pw").await);
    }

    let (tx, _rx) = notice::channel();
    let store = Store::new(MockGateway::default(), SessionFile::at(&session_path), tx);
    let restored = store.current_user.expect("identity restored across restart");
    assert_eq!(restored.id, "u1");
    assert_eq!(restored.pengu_credits, 15.0);
}

#[tokio::test]
async fn update_profile_applies_only_when_the_gateway_echoes() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on_fn("PUT /auth/profile", |body| {
        let body = body.unwrap();
        Ok(json!({
            "_id": "u1",
            "email": "u1@pengu.app",
            "role": "student",
            "name": body["name"],
        }))
    });

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    assert!(h.store.update_profile(json!({"name": "X"})).await);
    let user = h.store.current_user.as_ref().unwrap();
    assert_eq!(user.name.as_deref(), Some("X"));
    // bearer token survives a profile response that lacks it
    assert_eq!(user.token.as_deref(), Some("jwt-1"));

    h.store.gateway_ref().fail("PUT /auth/profile", 400, "Name rejected");
    assert!(!h.store.update_profile(json!({"name": "Y"})).await);
    assert_eq!(
        h.store.current_user.as_ref().unwrap().name.as_deref(),
        Some("X")
    );
}

#[tokio::test]
async fn review_deliverable_derives_progress_and_completion() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "GET /orders/mine",
        json!([{
            "_id": "o1",
            "studentId": "u1",
            "status": "Review",
            "progress": 50,
            "milestones": [
                {"_id": "m1", "status": "APPROVED"},
                {"_id": "m2", "status": "APPROVED"},
                {"_id": "m3", "status": "DELIVERED"},
                {"_id": "m4", "status": "DELIVERED"},
            ],
        }]),
    );
    // Server persists the derived payload verbatim and returns the canonical copy.
    gateway.on_fn("PUT /orders/o1", |body| {
        let body = body.unwrap();
        Ok(json!({
            "_id": "o1",
            "studentId": "u1",
            "status": body["status"],
            "progress": body["progress"],
            "milestones": body["milestones"],
        }))
    });

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    assert!(h.store.review_deliverable("o1", "m3", true).await);
    let order = &h.store.orders[0];
    assert_eq!(order.progress, 75);
    assert_eq!(order.status, OrderStatus::InProgress);
    assert_eq!(order.milestones[2].status, MilestoneStatus::Approved);

    assert!(h.store.review_deliverable("o1", "m4", true).await);
    let order = &h.store.orders[0];
    assert_eq!(order.progress, 100);
    assert_eq!(order.status, OrderStatus::Completed);
}

#[tokio::test]
async fn submit_milestone_marks_delivery_and_moves_order_to_review() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "GET /orders/mine",
        json!([{
            "_id": "o1",
            "status": "IN_PROGRESS",
            "milestones": [{"_id": "m1", "status": "IN_PROGRESS"}],
        }]),
    );
    gateway.on_fn("PUT /orders/o1", |body| {
        let body = body.unwrap();
        Ok(json!({
            "_id": "o1",
            "status": body["status"],
            "milestones": body["milestones"],
        }))
    });

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    assert!(
        h.store
            .submit_milestone("o1", "m1", vec!["draft.pdf".to_string()])
            .await
    );
    let order = &h.store.orders[0];
    assert_eq!(order.status, OrderStatus::Review);
    assert_eq!(order.milestones[0].status, MilestoneStatus::Delivered);
    assert_eq!(order.milestones[0].files, vec!["draft.pdf".to_string()]);
}

#[tokio::test]
async fn request_quote_order_lifecycle() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "POST /requests",
        json!({"_id": "r1", "studentId": "u1", "title": "Stats tutoring", "status": "SUBMITTED"}),
    );
    gateway.on(
        "POST /quotes",
        json!({
            "quote": {"_id": "q1", "requestId": "r1", "amount": 80.0, "status": "PENDING"},
            "request": {"_id": "r1", "title": "Stats tutoring", "status": "QUOTED"},
        }),
    );
    gateway.on(
        "POST /quotes/q1/accept",
        json!({
            "order": {"_id": "o1", "requestId": "r1", "status": "PENDING_VERIFICATION"},
            "quote": {"_id": "q1", "requestId": "r1", "amount": 80.0, "status": "ACCEPTED"},
            "request": {"_id": "r1", "title": "Stats tutoring", "status": "CONVERTED"},
        }),
    );

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    assert!(h.store.create_request(json!({"title": "Stats tutoring"})).await);
    assert_eq!(h.store.requests[0].status, RequestStatus::Submitted);

    assert!(h.store.create_quote("r1", 80.0, "Can do this week").await);
    assert_eq!(h.store.requests[0].status, RequestStatus::Quoted);
    assert_eq!(h.store.quotes[0].status, QuoteStatus::Pending);

    assert!(h.store.accept_quote("q1").await);
    assert_eq!(h.store.requests[0].status, RequestStatus::Converted);
    assert_eq!(h.store.quotes[0].status, QuoteStatus::Accepted);
    assert_eq!(h.store.orders[0].id, "o1");
    assert_eq!(h.store.orders[0].status, OrderStatus::PendingVerification);
}

#[tokio::test]
async fn counter_offer_moves_the_request_into_negotiation() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "GET /requests/mine",
        json!([{"_id": "r1", "title": "Stats tutoring", "status": "QUOTED"}]),
    );
    gateway.on(
        "GET /quotes/mine",
        json!([{"_id": "q1", "requestId": "r1", "amount": 80.0, "status": "PENDING"}]),
    );
    gateway.on(
        "POST /quotes/q1/counter",
        json!({
            "quote": {
                "_id": "q1",
                "requestId": "r1",
                "amount": 80.0,
                "status": "PENDING",
                "negotiationHistory": [
                    {"senderId": "u1", "message": "Would 60 work?", "amount": 60.0},
                ],
            },
            "request": {"_id": "r1", "title": "Stats tutoring", "status": "NEGOTIATION"},
        }),
    );

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    assert!(h.store.counter_quote("q1", 60.0, "Would 60 work?").await);
    assert_eq!(h.store.requests[0].status, RequestStatus::Negotiation);
    assert_eq!(h.store.quotes[0].negotiation_history.len(), 1);
    assert_eq!(h.store.quotes[0].negotiation_history[0].amount, Some(60.0));
}

#[tokio::test]
async fn federated_login_starts_a_session_like_password_login() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/federated", student("u1", 25.0));

    let mut h = harness(gateway);
    assert!(
        h.store
            .login_federated("id-token", Role::Student, Some("provider-token"))
            .await
    );

    let user = h.store.current_user.as_ref().unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.pengu_credits, 25.0);
    assert!(h.store.is_initialized);
    assert!(h.session_path.exists());
}

#[tokio::test]
async fn withdrawal_rejection_refunds_only_the_owning_student() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 100.0));
    gateway.on(
        "GET /withdrawals/mine",
        json!([
            {"_id": "w1", "studentId": "u1", "amount": 500.0, "status": "PENDING"},
            {"_id": "w2", "studentId": "someone-else", "amount": 200.0, "status": "PENDING"},
        ]),
    );
    gateway.on(
        "POST /withdrawals/w1/reject",
        json!({"_id": "w1", "studentId": "u1", "amount": 500.0, "status": "REJECTED"}),
    );
    gateway.on(
        "POST /withdrawals/w2/reject",
        json!({"_id": "w2", "studentId": "someone-else", "amount": 200.0, "status": "REJECTED"}),
    );

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);
    assert_eq!(h.store.current_user.as_ref().unwrap().pengu_credits, 100.0);

    assert!(h.store.reject_withdrawal("w1").await);
    assert_eq!(h.store.current_user.as_ref().unwrap().pengu_credits, 600.0);
    assert_eq!(h.store.withdrawals[0].status, WithdrawalStatus::Rejected);

    // someone else's withdrawal must not touch our wallet
    assert!(h.store.reject_withdrawal("w2").await);
    assert_eq!(h.store.current_user.as_ref().unwrap().pengu_credits, 600.0);
}

#[tokio::test]
async fn expert_withdrawal_rejection_credits_the_matching_profile() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", admin("a1"));
    gateway.on(
        "GET /experts",
        json!([
            {"_id": "e1", "name": "Prof", "balance": 50.0},
            {"_id": "e2", "name": "Doc", "balance": 10.0},
        ]),
    );
    gateway.on(
        "GET /withdrawals",
        json!([{"_id": "w1", "expertId": "e1", "amount": 300.0, "status": "PENDING"}]),
    );
    gateway.on(
        "POST /withdrawals/w1/reject",
        json!({"_id": "w1", "expertId": "e1", "amount": 300.0, "status": "REJECTED"}),
    );

    let mut h = harness(gateway);
    assert!(h.store.login("a1@pengu.app", "pw").await);

    assert!(h.store.reject_withdrawal("w1").await);
    assert_eq!(h.store.withdrawals[0].status, WithdrawalStatus::Rejected);
    let refunded = h.store.experts.iter().find(|e| e.id == "e1").unwrap();
    assert_eq!(refunded.balance, 350.0);
    // the other profile is untouched
    let other = h.store.experts.iter().find(|e| e.id == "e2").unwrap();
    assert_eq!(other.balance, 10.0);
}

#[tokio::test]
async fn notification_push_applies_directly_without_refetch() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "GET /notifications/mine",
        json!([{"_id": "n1", "title": "Old"}]),
    );

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);
    h.store.gateway_ref().clear_calls();

    h.store
        .handle_event(ServerEvent::NotificationCreated(
            json!({"_id": "n9", "title": "Hi"}),
        ))
        .await;

    assert_eq!(h.store.notifications[0].id, "n9");
    assert_eq!(h.store.notifications[0].title, "Hi");
    assert_eq!(h.store.notifications[1].id, "n1");
    assert!(
        h.store
            .gateway_ref()
            .calls()
            .iter()
            .all(|call| !call.contains("/notifications")),
        "notification_created must not trigger a re-fetch"
    );
}

#[tokio::test]
async fn order_event_refetches_the_role_scoped_collection() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "GET /orders/mine",
        json!([{"_id": "o1", "status": "ASSIGNED", "milestones": []}]),
    );

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);

    // server moved the order along; the event carries only a topic
    h.store.gateway_ref().on(
        "GET /orders/mine",
        json!([{"_id": "o1", "status": "IN_PROGRESS", "milestones": []}]),
    );
    h.store.gateway_ref().clear_calls();
    h.store
        .handle_event(ServerEvent::OrderUpdated(json!({"topic": "Order o1"})))
        .await;

    assert!(h.store.gateway_ref().calls().contains(&"GET /orders/mine".to_string()));
    assert_eq!(h.store.orders[0].status, OrderStatus::InProgress);
    let notices = h.drain_notices();
    assert!(notices.iter().any(|n| n.message == "Your order was updated"));
}

#[tokio::test]
async fn admin_bulk_load_uses_unscoped_collections() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", admin("a1"));
    gateway.on("GET /users", json!([student("u1", 0.0)]));
    gateway.on("GET /orders", json!([]));
    gateway.on("GET /system/settings", json!({"commissionRate": 0.15}));

    let mut h = harness(gateway);
    assert!(h.store.login("a1@pengu.app", "pw").await);

    assert!(h.store.is_initialized);
    assert_eq!(h.store.users.len(), 1);
    assert_eq!(h.store.settings.as_ref().unwrap().commission_rate, 0.15);
    let calls = h.store.gateway_ref().calls();
    assert!(calls.contains(&"GET /orders".to_string()));
    assert!(!calls.contains(&"GET /orders/mine".to_string()));
}

#[tokio::test]
async fn failed_mutation_leaves_the_cache_untouched() {
    let gateway = MockGateway::default();
    gateway.on("POST /auth/login", student("u1", 0.0));
    gateway.on(
        "GET /requests/mine",
        json!([{"_id": "r1", "title": "Old title", "status": "SUBMITTED"}]),
    );
    gateway.fail("POST /requests", 422, "Budget is required");

    let mut h = harness(gateway);
    assert!(h.store.login("u1@pengu.app", "pw").await);
    h.drain_notices();

    assert!(!h.store.create_request(json!({"title": "New"})).await);
    assert_eq!(h.store.requests.len(), 1);
    assert_eq!(h.store.requests[0].title, "Old title");
    let notices = h.drain_notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.message == "Budget is required"));
}
