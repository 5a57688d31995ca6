use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use courier_api::app::{build_app_with, services::AppServices};
use courier_auth::{JwtClaims, Role};
use courier_core::{Money, ProductId, Rate, StoreId, UserId};
use courier_infra::{InMemoryMarketRepository, InMemoryNotifier};
use courier_orders::CatalogProduct;
use courier_pricing::PlatformDeliveryConfig;
use courier_stores::{AdminOverride, Store, StoreAvailabilityEvaluator};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    client: reqwest::Client,
    customer: UserId,
    owner: UserId,
    worker: UserId,
    admin: UserId,
    store_id: StoreId,
}

impl TestServer {
    /// One open store with a 10% rate, one product at 10000.00 and two of it
    /// in the customer's cart. Delivery costs 3000.00 below 50000.00.
    async fn spawn() -> Self {
        Self::spawn_with(true).await
    }

    async fn spawn_with(delivery_config: bool) -> Self {
        let repo = Arc::new(InMemoryMarketRepository::new(Duration::from_secs(1)));

        let customer = UserId::new();
        let owner = UserId::new();
        let worker = UserId::new();
        let admin = UserId::new();
        repo.seed_user(customer, Role::Customer, "Dana Customer").await;
        repo.seed_user(owner, Role::StoreOwner, "Sam Owner").await;
        repo.seed_user(worker, Role::DeliveryWorker, "Lee Rider").await;
        repo.seed_user(admin, Role::Admin, "Ops Admin").await;

        let mut store = Store::new(StoreId::new(), owner, "Corner Bakery");
        store.is_active = true;
        store.admin_forced_status = AdminOverride::ForceOpen;
        store.commission_rate = Some(Rate::from_ten_thousandths(1_000).unwrap());
        let store_id = store.id;
        repo.seed_store(store).await;

        let product = CatalogProduct {
            id: ProductId::new(),
            store_id,
            name: "Celebration cake".to_string(),
            price: Money::from_major(10_000),
            is_available: true,
            stock_quantity: Some(5),
        };
        let product_id = product.id;
        repo.seed_product(product).await;
        repo.seed_cart_item(customer, product_id, 2).await;
        if delivery_config {
            repo.seed_delivery_config(PlatformDeliveryConfig::fixed_threshold(
                Money::from_major(3_000),
                Money::from_major(50_000),
            ))
            .await;
        }

        let services = AppServices::new(
            repo,
            Arc::new(InMemoryNotifier::new()),
            StoreAvailabilityEvaluator::utc(),
        );
        // Same router as prod, bound to an ephemeral port.
        let app = build_app_with(services, SECRET.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
            client: reqwest::Client::new(),
            customer,
            owner,
            worker,
            admin,
            store_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, user: UserId, role: Role, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(mint_jwt(user, role))
            .send()
            .await
            .unwrap();
        read(res).await
    }

    async fn post(&self, user: UserId, role: Role, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(mint_jwt(user, role))
            .json(&body)
            .send()
            .await
            .unwrap();
        read(res).await
    }

    async fn put(&self, user: UserId, role: Role, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .put(self.url(path))
            .bearer_auth(mint_jwt(user, role))
            .json(&body)
            .send()
            .await
            .unwrap();
        read(res).await
    }

    async fn place_order(&self) -> String {
        let (status, body) = self
            .post(
                self.customer,
                Role::Customer,
                "/orders",
                json!({ "store_id": self.store_id, "delivery_address": "12 Harbour Street" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Drive a fresh order up to `ready_for_delivery`.
    async fn ready_order(&self) -> String {
        let id = self.place_order().await;
        let (status, _) = self
            .post(
                self.owner,
                Role::StoreOwner,
                &format!("/store-owner/orders/{id}/accept"),
                json!({ "preparation_time_minutes": 20 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = self
            .post(self.owner, Role::StoreOwner, &format!("/store-owner/orders/{id}/ready"), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read(res: reqwest::Response) -> (StatusCode, Value) {
    let status = res.status();
    let text = res.text().await.unwrap();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, body)
}

fn mint_jwt(sub: UserId, role: Role) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        role,
        managed_regions: vec![],
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_echoes_the_resolved_actor() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get(srv.owner, Role::StoreOwner, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], srv.owner.to_string());
    assert_eq!(body["role"], "store_owner");
    assert_eq!(body["scope"]["kind"], "stores");
    assert_eq!(body["scope"]["stores"][0], srv.store_id.to_string());
}

#[tokio::test]
async fn order_lifecycle_over_http() {
    let srv = TestServer::spawn().await;

    let (status, quote) = srv
        .post(
            srv.customer,
            Role::Customer,
            "/orders/delivery-fee/estimate",
            json!({ "items_subtotal": "20000.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["delivery_fee"], "3000.00");
    assert_eq!(quote["estimated_grand_total"], "23000.00");

    let id = srv.place_order().await;
    let (_, order) = srv.get(srv.customer, Role::Customer, &format!("/orders/{id}")).await;
    assert_eq!(order["status"], "waiting");
    assert_eq!(order["grand_total"], "23000.00");
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);

    let (_, order) = srv
        .post(
            srv.owner,
            Role::StoreOwner,
            &format!("/store-owner/orders/{id}/accept"),
            json!({ "preparation_time_minutes": 25 }),
        )
        .await;
    assert_eq!(order["status"], "preparing");
    assert_eq!(order["preparation_time_estimate"], 25);

    let (_, order) = srv
        .post(srv.owner, Role::StoreOwner, &format!("/store-owner/orders/{id}/ready"), json!({}))
        .await;
    assert_eq!(order["status"], "ready_for_delivery");
    assert!(order["made_ready_at"].is_string());

    let (status, order) = srv
        .post(
            srv.admin,
            Role::Admin,
            &format!("/admin/orders/{id}/assign"),
            json!({ "delivery_worker_id": srv.worker }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "assigned_for_delivery");

    let (_, listed) = srv.get(srv.worker, Role::DeliveryWorker, "/delivery/orders").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let eta = Utc::now() + ChronoDuration::minutes(30);
    let (_, order) = srv
        .post(
            srv.worker,
            Role::DeliveryWorker,
            &format!("/delivery/orders/{id}/start"),
            json!({ "estimated_arrival_time": eta }),
        )
        .await;
    assert_eq!(order["status"], "out_for_delivery");

    let (status, order) = srv
        .post(
            srv.worker,
            Role::DeliveryWorker,
            &format!("/delivery/orders/{id}/delivered"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "delivered");

    let (_, listed) = srv.get(srv.worker, Role::DeliveryWorker, "/delivery/orders").await;
    assert!(listed.as_array().unwrap().is_empty());

    let (_, inbox) = srv.get(srv.customer, Role::Customer, "/notifications").await;
    assert_eq!(inbox.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn wrong_role_is_forbidden_but_foreign_scope_reads_as_not_found() {
    let srv = TestServer::spawn().await;
    let id = srv.place_order().await;

    let (status, body) = srv.get(srv.customer, Role::Customer, "/admin/orders").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let stranger = UserId::new();
    let (status, body) = srv
        .post(
            stranger,
            Role::StoreOwner,
            &format!("/store-owner/orders/{id}/accept"),
            json!({ "preparation_time_minutes": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found_or_forbidden");

    let (status, _) = srv
        .get(UserId::new(), Role::Customer, &format!("/orders/{id}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_transition_reports_the_current_status() {
    let srv = TestServer::spawn().await;
    let id = srv.place_order().await;

    let (status, body) = srv
        .post(srv.owner, Role::StoreOwner, &format!("/store-owner/orders/{id}/ready"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "precondition_failed");
    assert_eq!(body["current_status"], "waiting");
}

#[tokio::test]
async fn malformed_input_is_a_400() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .get(srv.customer, Role::Customer, "/orders/not-a-uuid")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = srv
        .post(
            srv.customer,
            Role::Customer,
            "/orders/delivery-fee/estimate",
            json!({ "items_subtotal": "10.005" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = srv
        .get(srv.admin, Role::Admin, "/admin/orders?status=misplaced")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn force_cancel_from_ready_needs_no_body_fields() {
    let srv = TestServer::spawn().await;
    let id = srv.ready_order().await;

    let (status, order) = srv
        .post(srv.admin, Role::Admin, &format!("/admin/orders/{id}/force-cancel"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "cancelled_by_admin");

    let (status, body) = srv
        .post(srv.admin, Role::Admin, &format!("/admin/orders/{id}/force-cancel"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_status"], "cancelled_by_admin");
}

#[tokio::test]
async fn commission_reports_are_generated_once_and_finalized_once() {
    let srv = TestServer::spawn().await;
    srv.ready_order().await;

    let today = Utc::now().date_naive();
    let period = json!({
        "store_id": srv.store_id,
        "start_date": (today - ChronoDuration::days(1)).to_string(),
        "end_date": (today + ChronoDuration::days(1)).to_string(),
    });

    let (status, report) = srv
        .post(srv.admin, Role::Admin, "/admin/commission-reports", period.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{report}");
    assert_eq!(report["commission_amount_calculated"], "2000.00");
    assert_eq!(report["lines"].as_array().unwrap().len(), 1);
    let report_id = report["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(srv.admin, Role::Admin, "/admin/commission-reports", period)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = srv
        .post(
            srv.admin,
            Role::Admin,
            "/admin/commission-reports",
            json!({ "store_id": srv.store_id, "start_date": "2020-01-01", "end_date": "2020-01-31" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "nothing_to_bill");

    let finalize = format!("/admin/commission-reports/{report_id}/finalize");
    let (status, report) = srv
        .post(srv.admin, Role::Admin, &finalize, json!({ "notes": "paid" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["is_finalized"], true);

    let (status, body) = srv.post(srv.admin, Role::Admin, &finalize, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "precondition_failed");
}

#[tokio::test]
async fn store_settings_and_availability() {
    let srv = TestServer::spawn().await;
    let store = format!("/stores/{}", srv.store_id);

    let (_, availability) = srv
        .get(srv.customer, Role::Customer, &format!("{store}/availability"))
        .await;
    assert_eq!(availability["accepting_orders"], true);
    assert_eq!(availability["reason"], "admin_forced_open");

    let (status, _) = srv
        .put(
            srv.owner,
            Role::StoreOwner,
            &format!("/store-owner{store}/override-status"),
            json!({ "status": "FORCE_OPEN" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = srv
        .put(
            srv.admin,
            Role::Admin,
            &format!("/admin{store}/override-status"),
            json!({ "status": "AUTO" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = srv
        .put(
            srv.owner,
            Role::StoreOwner,
            &format!("/store-owner{store}/override-status"),
            json!({ "status": "FORCE_CLOSED" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, availability) = srv
        .get(srv.customer, Role::Customer, &format!("{store}/availability"))
        .await;
    assert_eq!(availability["accepting_orders"], false);
    assert_eq!(availability["reason"], "owner_forced_closed");

    let (status, body) = srv
        .post(
            srv.customer,
            Role::Customer,
            "/orders",
            json!({ "store_id": srv.store_id, "delivery_address": "12 Harbour Street" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, updated) = srv
        .put(
            srv.admin,
            Role::Admin,
            &format!("/admin{store}/commission-rate"),
            json!({ "commission_rate": 12.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["commission_rate"], "0.1250");
}

#[tokio::test]
async fn inbox_can_be_read_and_cleared() {
    let srv = TestServer::spawn().await;
    srv.place_order().await;

    let (_, inbox) = srv.get(srv.owner, Role::StoreOwner, "/notifications").await;
    let entries = inbox.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let id = entries[0]["id"].as_str().unwrap().to_string();

    let (status, _) = srv
        .post(srv.customer, Role::Customer, &format!("/notifications/{id}/read"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv
        .post(srv.owner, Role::StoreOwner, &format!("/notifications/{id}/read"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = srv
        .post(srv.owner, Role::StoreOwner, "/notifications/read-all", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn missing_delivery_config_is_a_server_fault() {
    let srv = TestServer::spawn_with(false).await;

    let (status, body) = srv
        .post(
            srv.customer,
            Role::Customer,
            "/orders/delivery-fee/estimate",
            json!({ "items_subtotal": "100.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "configuration_error");

    let (status, _) = srv.get(srv.admin, Role::Admin, "/admin/delivery-config").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, config) = srv
        .put(
            srv.admin,
            Role::Admin,
            "/admin/delivery-config",
            json!({
                "active_rule_type": "PERCENTAGE",
                "percentage_rate": "0.05",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{config}");
    assert_eq!(config["percentage_rate"], "0.0500");
}
