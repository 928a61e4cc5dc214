//! API v1 routes.
//!
//! Every collection gets the same five endpoints. Reads go through the
//! read-through cache; writes first invalidate everything cached under the
//! collection's path.

use crate::{
    cache::{keys, CacheClient},
    error::{not_found, ApiError, ApiResult},
    middleware::{InvalidateLayer, ReadThroughLayer},
    records::{Collection, Page},
    state::AppState,
};
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Mount point of this API version.
pub const API_PREFIX: &str = "/api/v1";

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

/// Create the v1 API router.
pub fn router(cache: &CacheClient) -> Router<AppState> {
    Collection::ALL
        .iter()
        .fold(Router::new(), |router, &collection| {
            router.nest(
                &format!("/{}", collection),
                collection_routes(cache, collection),
            )
        })
}

/// Invalidation pattern covering every cached response of a collection.
pub fn invalidation_pattern(collection: Collection) -> String {
    keys::invalidate::resource(&format!("{}/{}", API_PREFIX, collection))
}

fn collection_routes(cache: &CacheClient, collection: Collection) -> Router<AppState> {
    let read_through = ReadThroughLayer::from_config(cache.clone());
    let invalidate = InvalidateLayer::new(cache.clone(), invalidation_pattern(collection));

    Router::new()
        .route(
            "/",
            get(list_records)
                .layer(read_through.clone())
                .merge(post(create_record).layer(invalidate.clone())),
        )
        .route(
            "/:id",
            get(get_record)
                .layer(read_through)
                .merge(put(update_record).layer(invalidate.clone()))
                .merge(delete(delete_record).layer(invalidate)),
        )
        .layer(Extension(collection))
}

/// Parsed list parameters.
#[derive(Debug, PartialEq)]
struct ListQuery {
    filters: Vec<(String, String)>,
    page: usize,
    limit: usize,
}

fn parse_list_query(query: Option<&str>) -> ApiResult<ListQuery> {
    let mut parsed = ListQuery {
        filters: Vec::new(),
        page: 1,
        limit: DEFAULT_PAGE_SIZE,
    };

    for (name, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match name.as_ref() {
            "page" => parsed.page = parse_positive("page", &value)?,
            "limit" => parsed.limit = parse_positive("limit", &value)?,
            _ => parsed.filters.push((name.into_owned(), value.into_owned())),
        }
    }

    if parsed.limit > MAX_PAGE_SIZE {
        let mut fields = HashMap::new();
        fields.insert(
            "limit".to_string(),
            vec![format!("must be at most {}", MAX_PAGE_SIZE)],
        );
        return Err(ApiError::ValidationError(fields));
    }

    Ok(parsed)
}

fn parse_positive(name: &str, value: &str) -> ApiResult<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::InvalidQueryParam(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

fn into_fields(body: Value) -> ApiResult<Map<String, Value>> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::BadRequest("request body must be a JSON object".into())),
    }
}

async fn list_records(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Page>> {
    let query = parse_list_query(query.as_deref())?;
    Ok(Json(state.records.list(
        collection,
        &query.filters,
        query.page,
        query.limit,
    )))
}

async fn get_record(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state
        .records
        .get(collection, id)
        .map(Json)
        .ok_or_else(|| not_found(collection.as_str(), id))
}

async fn create_record(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let fields = into_fields(body)?;
    let record = state.records.create(collection, fields);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let fields = into_fields(body)?;
    state
        .records
        .update(collection, id, fields)
        .map(Json)
        .ok_or_else(|| not_found(collection.as_str(), id))
}

async fn delete_record(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.records.delete(collection, id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(collection.as_str(), id))
    }
}
