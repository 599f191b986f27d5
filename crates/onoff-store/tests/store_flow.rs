//! End-to-end flows against an in-process fake forge.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use maplit::btreeset;
use serde_json::{Value, json};
use tower::ServiceExt;

use onoff_store::catalog::Catalog;
use onoff_store::endpoints::{ForgeClient, ReleaseSource};
use onoff_store::gateway::{self, AppState};
use onoff_store::install::{Executor, InstallPlan, InstallRequest};
use onoff_store::instance::{Instances, StoreInstance};
use onoff_store::ledger::{Ledger, MemoryStorage};
use onoff_store::models::{InstallMode, PackageType};

const GOOD_TOKEN: &str = "good";

#[derive(Clone)]
struct Forge {
    base: String,
    latest: Arc<Mutex<String>>,
}

fn repo_json(owner: &str, name: &str, description: &str) -> Value {
    json!({
        "id": 7,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "owner": { "id": 1, "login": owner },
        "description": description,
        "updated_at": "2026-01-02T03:04:05Z",
    })
}

async fn user(headers: HeaderMap) -> Response {
    let expected = format!("Bearer {GOOD_TOKEN}");
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(auth) if auth == expected => Json(json!({ "id": 1, "login": "alice" })).into_response(),
        _ => (StatusCode::UNAUTHORIZED, "bad token").into_response(),
    }
}

async fn org_repos(Path(org): Path<String>) -> Response {
    if org == "Team" {
        return Json(json!([repo_json("Team", "team-tools", "Shared automation blueprint")]))
            .into_response();
    }
    if org != "Zing" {
        return (StatusCode::NOT_FOUND, "no such org").into_response();
    }
    Json(json!([
        repo_json("Zing", "heater", "Modbus heat pump integration"),
        repo_json("Zing", "x-secret", "internal"),
        repo_json("Zing", "status-card", "A dashboard card"),
    ]))
    .into_response()
}

async fn repo(Path((owner, name)): Path<(String, String)>) -> Json<Value> {
    Json(repo_json(&owner, &name, ""))
}

async fn latest_release(
    State(forge): State<Forge>,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    if name != "heater" {
        return (StatusCode::NOT_FOUND, "no releases").into_response();
    }
    let tag = forge.latest.lock().unwrap().clone();
    Json(json!({
        "id": 3,
        "tag_name": tag,
        "assets": [{
            "id": 9,
            "name": "heater.zip",
            "browser_download_url": format!("{}/{owner}/{name}/releases/download/{tag}/heater.zip", forge.base),
        }],
    }))
    .into_response()
}

async fn readme(Path((_owner, name)): Path<(String, String)>) -> Response {
    if name == "heater" {
        "# Heater".into_response()
    } else {
        (StatusCode::NOT_FOUND, "").into_response()
    }
}

/// Serve the fake forge on an ephemeral port and return it.
async fn spawn_forge(tag: &str) -> Forge {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let forge = Forge {
        base: format!("http://{}", listener.local_addr().unwrap()),
        latest: Arc::new(Mutex::new(tag.to_string())),
    };
    let app = Router::new()
        .route("/api/v1/user", get(user))
        .route(
            "/api/v1/user/orgs",
            get(|| async { Json(json!([{ "id": 5, "username": "Team" }])) }),
        )
        .route("/api/v1/user/repos", get(|| async { Json(json!([])) }))
        .route("/api/v1/orgs/{org}/repos", get(org_repos))
        .route("/api/v1/repos/{owner}/{repo}", get(repo))
        .route("/api/v1/repos/{owner}/{repo}/releases/latest", get(latest_release))
        .route("/api/v1/repos/{owner}/{repo}/raw/README.md", get(readme))
        .with_state(forge.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    forge
}

#[derive(Default)]
struct RecordingExecutor {
    installed: Mutex<Vec<InstallPlan>>,
    removed: Mutex<Vec<(PackageType, String)>>,
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn install(&self, plan: &InstallPlan) -> onoff_store::Result<()> {
        self.installed.lock().unwrap().push(plan.clone());
        Ok(())
    }

    async fn uninstall(&self, package_type: PackageType, repo: &str) -> onoff_store::Result<()> {
        self.removed
            .lock()
            .unwrap()
            .push((package_type, repo.to_string()));
        Ok(())
    }
}

fn store(forge: &Forge, token: Option<&str>, executor: Arc<RecordingExecutor>) -> StoreInstance {
    store_with_list(forge, token, executor, "/nonexistent/store_list.yaml")
}

fn store_with_list(
    forge: &Forge,
    token: Option<&str>,
    executor: Arc<RecordingExecutor>,
    store_list: impl Into<std::path::PathBuf>,
) -> StoreInstance {
    let client = ForgeClient::new(&forge.base, token.map(str::to_string));
    let releases: Arc<dyn ReleaseSource> = Arc::new(client.clone());
    let ledger = Arc::new(Ledger::new(Arc::new(MemoryStorage::default()), releases));
    StoreInstance {
        id: "default".to_string(),
        client,
        ledger,
        catalog: Catalog::new(store_list, vec!["Zing".to_string()]),
        executor,
    }
}

#[tokio::test]
async fn auth_probe() {
    let forge = spawn_forge("v1.0").await;
    assert!(ForgeClient::new(&forge.base, None).test_auth().await);
    assert!(ForgeClient::new(&forge.base, Some(GOOD_TOKEN.into())).test_auth().await);
    assert!(!ForgeClient::new(&forge.base, Some("revoked".into())).test_auth().await);
}

#[tokio::test]
async fn install_then_detect_update() {
    let forge = spawn_forge("v1.0").await;
    let executor = Arc::new(RecordingExecutor::default());
    let instance = store(&forge, None, executor.clone());

    let req = InstallRequest::parse(Some("Zing"), Some("heater"), None, None, None).unwrap();
    let outcome = instance.install(&req).await.unwrap();
    assert_eq!(outcome.package_id, "zing_heater");
    assert_eq!(outcome.version, "v1.0");

    let plans = executor.installed.lock().unwrap().clone();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].mode, InstallMode::Asset);
    assert_eq!(plans[0].asset_name.as_deref(), Some("heater.zip"));
    assert!(plans[0].download_url.ends_with("/v1.0/heater.zip"));

    let report = instance.refresh().await.unwrap();
    assert_eq!(report.checked, 1);
    assert!(report.updates_available.is_empty());

    *forge.latest.lock().unwrap() = "v1.1".to_string();
    let report = instance.refresh().await.unwrap();
    assert_eq!(report.updates_available, vec!["zing_heater".to_string()]);
    let record = instance.ledger.get("zing_heater").await.unwrap();
    assert!(record.update_available);
    assert_eq!(record.installed_version, "v1.0");
    assert_eq!(record.latest_version, "v1.1");
    assert!(record.last_check.is_some());

    assert!(
        instance
            .uninstall("zing", "HEATER", PackageType::Integration)
            .await
            .unwrap()
    );
    assert!(instance.ledger.packages().await.is_empty());
    assert_eq!(executor.removed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn browse_hides_x_repos_without_session() {
    let forge = spawn_forge("v1.0").await;
    let public = store(&forge, None, Arc::default());
    let names: BTreeSet<String> = public.browse().await.into_iter().map(|e| e.repo_name).collect();
    assert_eq!(names, btreeset! {"heater".to_string(), "status-card".to_string()});

    let card = public
        .browse()
        .await
        .into_iter()
        .find(|e| e.repo_name == "status-card")
        .unwrap();
    assert_eq!(card.package_type, PackageType::Lovelace);
    assert!(!card.is_installed);

    let authed = store(&forge, Some(GOOD_TOKEN), Arc::default());
    let names: BTreeSet<String> = authed.browse().await.into_iter().map(|e| e.repo_name).collect();
    assert!(names.contains("x-secret"));

    // revoked token behaves like public access
    let revoked = store(&forge, Some("revoked"), Arc::default());
    let names: BTreeSet<String> = revoked.browse().await.into_iter().map(|e| e.repo_name).collect();
    assert!(!names.contains("x-secret"));
}

#[tokio::test]
async fn browse_merges_store_list_custom_repos_and_user_orgs() {
    let forge = spawn_forge("v1.0").await;
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("store_list.yaml");
    std::fs::write(
        &list,
        "packages:\n  - owner: Listed\n    repo: x-listed\n    mode: zipball\n",
    )
    .unwrap();

    let public = store_with_list(&forge, None, Arc::default(), &list);
    public.ledger.add_custom_repo("acme", "x-custom").await.unwrap();
    let rows = public.browse().await;
    let names: BTreeSet<String> = rows.iter().map(|e| e.name.clone()).collect();
    assert_eq!(
        names,
        btreeset! {
            "Listed/x-listed".to_string(),
            "Zing/heater".to_string(),
            "Zing/status-card".to_string(),
            "acme/x-custom".to_string(),
        }
    );
    let listed = rows.iter().find(|e| e.name == "Listed/x-listed").unwrap();
    assert_eq!(listed.mode, Some(InstallMode::Zipball));

    let authed = store_with_list(&forge, Some(GOOD_TOKEN), Arc::default(), &list);
    let rows = authed.browse().await;
    let team = rows.iter().find(|e| e.name == "Team/team-tools").unwrap();
    assert_eq!(team.package_type, PackageType::Blueprints);
    assert!(rows.iter().any(|e| e.name == "Zing/x-secret"));
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    send(app, req).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn gateway_without_instances_is_not_ready() {
    let app = gateway::build(Arc::new(AppState::default()));
    let (status, body) = call(&app, "GET", "/api/onoff_store/packages", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({ "error": "Integration not ready" })
    );

    // params are checked before instance lookup
    let (status, body) = call(
        &app,
        "POST",
        "/api/onoff_store/install",
        Some(json!({ "repo": "heater" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing params"));

    let (status, _) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn gateway_rejects_bad_bodies_as_json() {
    let forge = spawn_forge("v1.0").await;
    let mut instances = Instances::new();
    instances.insert(store(&forge, None, Arc::default()));
    let app = gateway::build(Arc::new(AppState { instances }));

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/onoff_store/hide")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let untyped = Request::builder()
        .method("POST")
        .uri("/api/onoff_store/install")
        .body(Body::from(r#"{"owner":"Zing","repo":"heater"}"#))
        .unwrap();
    let (status, body) = send(&app, untyped).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(serde_json::from_str::<Value>(&body).unwrap()["error"].is_string());

    for repo in ["..", "a/../b"] {
        let (status, body) = call(
            &app,
            "POST",
            "/api/onoff_store/uninstall",
            Some(json!({ "owner": "Zing", "repo": repo })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{repo}");
        assert!(body.contains("invalid repository name"), "{body}");
    }
}

#[tokio::test]
async fn gateway_routes() {
    let forge = spawn_forge("v2.0").await;
    let mut instances = Instances::new();
    let instance = instances.insert(store(&forge, None, Arc::default()));
    let app = gateway::build(Arc::new(AppState { instances }));

    let (status, body) = call(
        &app,
        "POST",
        "/api/onoff_store/install",
        Some(json!({ "repo": "heater" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing params"));

    let (status, body) = call(
        &app,
        "POST",
        "/api/onoff_store/install",
        Some(json!({ "owner": "Zing", "repo": "heater", "type": "integration" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["package_id"], "zing_heater");
    assert_eq!(body["version"], "v2.0");

    // unknown entry ids fall back to the first instance
    let (status, body) = call(&app, "GET", "/api/onoff_store/packages?entry=other", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("zing_heater"));

    let (status, body) = call(
        &app,
        "POST",
        "/api/onoff_store/install",
        Some(json!({ "owner": "Zing", "repo": "heater", "type": "theme" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, body) = call(&app, "GET", "/api/onoff_store/readme/Zing/heater", None).await;
    assert_eq!(body, "# Heater");
    let (status, body) = call(&app, "GET", "/api/onoff_store/readme/Zing/status-card", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "No README found for this repository.");

    let (status, body) = call(
        &app,
        "POST",
        "/api/onoff_store/custom/add",
        Some(json!({ "owner": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing params"));
    let (status, _) = call(
        &app,
        "POST",
        "/api/onoff_store/custom/add",
        Some(json!({ "owner": "acme", "repo": "x-custom" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(instance.ledger.is_custom_repo("ACME", "x-custom").await);
    let (_, body) = call(&app, "GET", "/api/onoff_store/repos", None).await;
    assert!(body.contains("acme/x-custom"));

    let hide = json!({ "owner": "Zing", "repo": "heater" });
    let (status, _) = call(&app, "POST", "/api/onoff_store/hide", Some(hide.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(instance.ledger.is_hidden_repo("zing", "heater").await);
    call(&app, "POST", "/api/onoff_store/unhide", Some(hide)).await;
    assert!(!instance.ledger.is_hidden_repo("zing", "heater").await);

    let (status, body) = call(&app, "POST", "/api/onoff_store/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["report"]["checked"], 1);

    let (status, _) = call(
        &app,
        "POST",
        "/api/onoff_store/uninstall",
        Some(json!({ "owner": "Zing", "repo": "heater" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(instance.ledger.packages().await.is_empty());
}
