#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use trustgate_adapter::{
    AdapterHealthResponse, AdapterRuntime, HookOutcome, HookResponse, LoginHookRequest,
    RegistrationHookRequest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("TRUSTGATE_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()));
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/hooks/login", post(run_login_hook))
        .route("/v1/hooks/registration", post(run_registration_hook))
        .with_state(runtime);

    println!("trustgate_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz(
    State(runtime): State<Arc<Mutex<AdapterRuntime>>>,
) -> (StatusCode, Json<AdapterHealthResponse>) {
    match runtime.lock() {
        Ok(runtime) => (StatusCode::OK, Json(runtime.health_report())),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                accounts: 0,
            }),
        ),
    }
}

async fn run_login_hook(
    State(runtime): State<Arc<Mutex<AdapterRuntime>>>,
    Json(request): Json<LoginHookRequest>,
) -> (StatusCode, Json<HookResponse>) {
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_poisoned(),
    };
    respond("trustgate_adapter_http", runtime.run_login_hook(&request))
}

async fn run_registration_hook(
    State(runtime): State<Arc<Mutex<AdapterRuntime>>>,
    Json(request): Json<RegistrationHookRequest>,
) -> (StatusCode, Json<HookResponse>) {
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_poisoned(),
    };
    respond(
        "trustgate_adapter_http",
        runtime.run_registration_hook(&request),
    )
}

fn respond(tag: &str, outcome: HookOutcome) -> (StatusCode, Json<HookResponse>) {
    for line in &outcome.log_lines {
        eprintln!("{tag} {line}");
    }
    let code = if outcome.response.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(outcome.response))
}

fn lock_poisoned() -> (StatusCode, Json<HookResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(HookResponse::invalid_input(
            "adapter runtime lock poisoned".to_string(),
        )),
    )
}
