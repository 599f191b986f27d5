use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::error::ApiError;
use crate::catalog::CatalogEntry;
use crate::install::{InstallRequest, require_repo};
use crate::instance::StoreInstance;
use crate::models::{PackageRecord, PackageType};

const NO_README: &str = "No README found for this repository.";

/// `?entry=<id>` picks an instance; anything else means the first one.
#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    pub entry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoBody {
    pub owner: Option<String>,
    pub repo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PackageBody {
    pub owner: Option<String>,
    pub repo: Option<String>,
    #[serde(rename = "type")]
    pub package_type: Option<String>,
    pub mode: Option<String>,
    pub asset_name: Option<String>,
    pub version: Option<String>,
}

fn instance(state: &AppState, query: &EntryQuery) -> Result<Arc<StoreInstance>, ApiError> {
    state
        .instances
        .resolve(query.entry.as_deref())
        .ok_or(ApiError::NotReady)
}

/// Blank or absent fields are `Missing params`; a malformed repo name is
/// reported as such.
fn owner_repo(owner: Option<&str>, repo: Option<&str>) -> Result<(String, String), ApiError> {
    let blank = |v: Option<&str>| v.is_none_or(|v| v.trim().is_empty());
    if blank(owner) || blank(repo) {
        return Err(ApiError::MissingParams);
    }
    Ok(require_repo(owner, repo)?)
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_repos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Vec<CatalogEntry>>, ApiError> {
    let instance = instance(&state, &query)?;
    Ok(Json(instance.browse().await))
}

pub async fn list_packages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<BTreeMap<String, PackageRecord>>, ApiError> {
    let instance = instance(&state, &query)?;
    Ok(Json(instance.ledger.packages().await))
}

pub async fn install(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    body: Result<Json<PackageBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    owner_repo(body.owner.as_deref(), body.repo.as_deref())?;
    let instance = instance(&state, &query)?;
    let mut req = InstallRequest::parse(
        body.owner.as_deref(),
        body.repo.as_deref(),
        body.package_type.as_deref(),
        body.mode.as_deref(),
        body.asset_name.as_deref(),
    )?;
    if let Some(tag) = body.version.as_deref().filter(|v| !v.is_empty()) {
        req = req.version(tag);
    }
    let outcome = instance.install(&req).await?;
    Ok(Json(json!({
        "success": true,
        "package_id": outcome.package_id,
        "version": outcome.version,
    })))
}

pub async fn readme(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let instance = instance(&state, &query)?;
    let text = instance
        .client
        .get_readme(&owner, &repo)
        .await?
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_README.to_string());
    Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], text))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Value>, ApiError> {
    let instance = instance(&state, &query)?;
    let report = instance.refresh().await?;
    Ok(Json(json!({ "success": true, "report": report })))
}

pub async fn add_custom(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    body: Result<Json<RepoBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let (owner, repo) = owner_repo(body.owner.as_deref(), body.repo.as_deref())?;
    let instance = instance(&state, &query)?;
    instance.ledger.add_custom_repo(&owner, &repo).await?;
    Ok(success())
}

pub async fn hide(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    body: Result<Json<RepoBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let (owner, repo) = owner_repo(body.owner.as_deref(), body.repo.as_deref())?;
    let instance = instance(&state, &query)?;
    instance.ledger.hide_repo(&owner, &repo).await?;
    Ok(success())
}

pub async fn unhide(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    body: Result<Json<RepoBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let (owner, repo) = owner_repo(body.owner.as_deref(), body.repo.as_deref())?;
    let instance = instance(&state, &query)?;
    instance.ledger.unhide_repo(&owner, &repo).await?;
    Ok(success())
}

pub async fn uninstall(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    body: Result<Json<PackageBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let (owner, repo) = owner_repo(body.owner.as_deref(), body.repo.as_deref())?;
    let package_type = match body.package_type.as_deref().filter(|t| !t.is_empty()) {
        Some(t) => t.parse()?,
        None => PackageType::default(),
    };
    let instance = instance(&state, &query)?;
    instance.uninstall(&owner, &repo, package_type).await?;
    Ok(success())
}
