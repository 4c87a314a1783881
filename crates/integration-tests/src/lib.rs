//! Integration test harness for the Kuppam cart library.
//!
//! Runs the reconciliation engine against [`StubApi`], an in-process axum
//! server speaking the storefront REST surface:
//!
//! - `GET/POST/DELETE /cart`
//! - `PUT/DELETE /cart/item/{itemId}`
//! - `POST /auth/login`, `POST /auth/signup`
//!
//! The stub keeps one server-side cart, validates bearer tokens it issued,
//! and can be told to fail mutations of a specific product to exercise the
//! partial-merge paths.
//!
//! # Test Categories
//!
//! - `cart_authed` - authenticated mutations, caching, races
//! - `cart_merge` - merge-on-login scenarios
//! - `session_watcher` - transition side effects

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kuppam_cart::{
    AuthApi, AuthService, CachePolicy, CartApi, CartEvent, CartService, KeyValueStore,
    LocalCartStore, MemoryStore, SessionHandle,
};
use kuppam_core::{ProductId, ProductSnapshot};
use rust_decimal::dec;
use secrecy::SecretString;
use tokio::sync::broadcast;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

/// One line item in the stub's server-side cart.
#[derive(Debug, Clone)]
pub struct StubItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Mutable stub state, shared with tests for seeding and assertions.
#[derive(Debug, Default)]
pub struct StubState {
    /// The authenticated user's server cart.
    pub items: Vec<StubItem>,
    /// Tokens issued by the auth endpoints (or seeded by tests).
    pub valid_tokens: HashSet<String>,
    /// Product whose mutations answer 500, for failure injection.
    pub fail_product: Option<String>,
    /// Number of `GET /cart` requests served.
    pub get_cart_calls: usize,
}

/// Handle to a running stub API server.
pub struct StubApi {
    pub base_url: String,
    pub state: Arc<Mutex<StubState>>,
}

impl StubApi {
    /// Start the stub on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(StubState::default()));
        let app = router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub listener");
        let addr = listener.local_addr().expect("listener has no local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Lock the stub state.
    pub fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the server cart with a line.
    pub fn seed_item(&self, product_id: &str, quantity: i64) {
        self.state().items.push(StubItem {
            product_id: product_id.to_string(),
            quantity,
        });
    }

    /// Quantity of a product in the server cart, if present.
    pub fn quantity_of(&self, product_id: &str) -> Option<i64> {
        self.state()
            .items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.quantity)
    }

    /// Make every mutation of `product_id` fail with a 500.
    pub fn fail_product(&self, product_id: &str) {
        self.state().fail_product = Some(product_id.to_string());
    }

    /// Stop injected failures.
    pub fn heal(&self) {
        self.state().fail_product = None;
    }
}

type SharedState = Arc<Mutex<StubState>>;

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_item).delete(clear_cart))
        .route("/cart/item/{item_id}", put(update_item).delete(delete_item))
        .route("/auth/login", post(issue_token))
        .route("/auth/signup", post(issue_token))
        .with_state(state)
}

fn lock(state: &SharedState) -> std::sync::MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn authorized(headers: &HeaderMap, state: &StubState) -> bool {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| state.valid_tokens.contains(token))
}

/// Render the cart in the storefront API's envelope shape.
fn cart_json(state: &StubState) -> Value {
    let items: Vec<Value> = state
        .items
        .iter()
        .map(|item| {
            json!({
                "product": {
                    "id": item.product_id,
                    "name": format!("Product {}", item.product_id),
                    "description": "",
                    "price": 10.0,
                    "images": ["/img/stub.jpg"],
                    "stock": 5,
                    "category": "Stub"
                },
                "quantity": item.quantity
            })
        })
        .collect();
    json!({ "cart": { "items": items } })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody {
    product_id: String,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateItemBody {
    quantity: i64,
}

async fn get_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut guard = lock(&state);
    if !authorized(&headers, &guard) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    guard.get_cart_calls += 1;
    Json(cart_json(&guard)).into_response()
}

async fn add_item(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<AddItemBody>,
) -> Response {
    let mut guard = lock(&state);
    if !authorized(&headers, &guard) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if guard.fail_product.as_deref() == Some(body.product_id.as_str()) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match guard
        .items
        .iter_mut()
        .find(|item| item.product_id == body.product_id)
    {
        Some(item) => item.quantity += body.quantity,
        None => guard.items.push(StubItem {
            product_id: body.product_id,
            quantity: body.quantity,
        }),
    }
    Json(cart_json(&guard)).into_response()
}

async fn update_item(
    State(state): State<SharedState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateItemBody>,
) -> Response {
    let mut guard = lock(&state);
    if !authorized(&headers, &guard) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if guard.fail_product.as_deref() == Some(item_id.as_str()) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match guard
        .items
        .iter_mut()
        .find(|item| item.product_id == item_id)
    {
        Some(item) => {
            item.quantity = body.quantity;
            Json(cart_json(&guard)).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Item not found").into_response(),
    }
}

async fn delete_item(
    State(state): State<SharedState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut guard = lock(&state);
    if !authorized(&headers, &guard) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let before = guard.items.len();
    guard.items.retain(|item| item.product_id != item_id);
    if guard.items.len() == before {
        return (StatusCode::NOT_FOUND, "Item not found").into_response();
    }
    Json(cart_json(&guard)).into_response()
}

async fn clear_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut guard = lock(&state);
    if !authorized(&headers, &guard) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    guard.items.clear();
    Json(cart_json(&guard)).into_response()
}

async fn issue_token(State(state): State<SharedState>) -> Response {
    let token = format!("tok-{}", Uuid::new_v4());
    lock(&state).valid_tokens.insert(token.clone());
    Json(json!({ "token": token })).into_response()
}

// =============================================================================
// Test context
// =============================================================================

/// A cart engine wired to a fresh stub API over in-memory storage.
pub struct TestContext {
    pub api: StubApi,
    pub cart: CartService,
    pub auth: AuthService,
    store: Arc<MemoryStore>,
}

impl TestContext {
    /// Spawn a stub and assemble the engine against it.
    ///
    /// Logging honors `RUST_LOG`; run tests with it set to see engine spans.
    pub async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let api = StubApi::spawn().await;
        let store = Arc::new(MemoryStore::new());
        let kv: Arc<dyn KeyValueStore> = store.clone();

        let session = SessionHandle::restore(Arc::clone(&kv));
        let client = reqwest::Client::new();
        let cart_api = CartApi::new(client.clone(), &api.base_url, session.clone());
        let auth = AuthService::new(AuthApi::new(client, &api.base_url), session.clone());
        let cart = CartService::new(
            cart_api,
            LocalCartStore::new(kv),
            session,
            CachePolicy::default(),
        );

        Self {
            api,
            cart,
            auth,
            store,
        }
    }

    /// Log in through the stub auth endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the stub rejects the login.
    pub async fn login(&self) {
        self.auth
            .login(
                "test@kuppamorganics.com",
                &SecretString::from("correct horse".to_string()),
            )
            .await
            .expect("stub login failed");
    }

    /// A direct view of the locally persisted cart.
    pub fn local(&self) -> LocalCartStore {
        let kv: Arc<dyn KeyValueStore> = self.store.clone();
        LocalCartStore::new(kv)
    }

    /// A product snapshot matching the stub's catalog shape.
    #[must_use]
    pub fn snapshot(id: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: dec!(10.0),
            original_price: None,
            image: "/img/stub.jpg".to_string(),
            category: "stub".to_string(),
            weight: "1 kg".to_string(),
            in_stock: true,
        }
    }
}

/// Wait until `expected` arrives on the event channel.
///
/// # Panics
///
/// Panics if the event does not arrive within five seconds.
pub async fn wait_for_event(rx: &mut broadcast::Receiver<CartEvent>, expected: CartEvent) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if event == expected => return,
                Ok(_) => {}
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for cart event");
}

/// Poll `condition` until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within timeout");
}
