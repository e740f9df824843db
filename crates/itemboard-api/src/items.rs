use std::time::Duration;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use itemboard_db::models::ItemRow;
use itemboard_db::{ItemChanges, ItemSearch, LikesOverflow, NewItem};
use itemboard_types::api::{
    Claims, CreateItemRequest, DeleteItemRequest, ItemFilter, ItemListResponse, ItemResponse,
    ListItemsQuery, MessageResponse, Pagination, UpdateItemRequest,
};
use itemboard_types::events::{GatewayEvent, ItemChange};
use itemboard_types::models::{Item, Owner};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};
use crate::uploads;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// GET /api/items?page&limit&q: one page of items, newest first.
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> ApiResult<Json<ItemListResponse>> {
    if state.config.simulate_latency {
        if let Some(delay) = simulated_latency() {
            debug!("Delaying item listing by {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    let page = parse_count(query.page.as_deref(), DEFAULT_PAGE);
    let limit = parse_count(query.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT);
    let search = parse_search(query.q.as_deref())?;
    let offset = u64::from(page - 1) * u64::from(limit);

    let (rows, total) = run_db(&state, "Failed to fetch items", move |db| {
        db.list_items(&search, offset, limit)
    })
    .await?;

    Ok(Json(ItemListResponse {
        data: rows.into_iter().map(item_from_row).collect(),
        pagination: Pagination { page, limit, total },
    }))
}

/// GET /api/items/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ItemResponse>> {
    let item_id = parse_item_id(&id)?;

    let row = run_db(&state, "Failed to fetch item", move |db| {
        db.get_item(&item_id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound("Item not found"))?;

    Ok(Json(ItemResponse {
        data: item_from_row(row),
        message: None,
    }))
}

/// POST /api/items: editors and admins only.
pub async fn create_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateItemRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.unwrap_or_default();
    let description = req.description.unwrap_or_default();
    if title.trim().is_empty() || description.trim().is_empty() {
        return Err(ApiError::bad_request("Title and description are required"));
    }

    let details = json!({ "title": title, "description": description });
    let new_item = NewItem {
        id: Uuid::new_v4().to_string(),
        title,
        description,
        created_by: claims.sub.to_string(),
    };

    let row = run_db(&state, "Failed to create item", move |db| {
        db.create_item(&new_item, &details)
    })
    .await?;

    let item = item_from_row(row);
    info!("{} created item {}", claims.email, item.id);
    announce(&state, ItemChange::Created, item.id, Some(item.clone())).await;

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse {
            data: item,
            message: None,
        }),
    ))
}

/// PUT /api/items/{id}: editors and admins only. `likes` is an increment.
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateItemRequest>, ApiError>,
) -> ApiResult<Json<ItemResponse>> {
    let item_id = parse_item_id(&id)?;

    // Details record what the caller sent, not what was applied.
    let details = serde_json::to_value(&req).map_err(ApiError::internal("Failed to update item"))?;
    let changes = ItemChanges {
        title: req.title.filter(|t| !t.trim().is_empty()),
        description: req.description.filter(|d| !d.trim().is_empty()),
        likes_delta: req.likes,
        image_url: None,
    };

    let actor = claims.sub.to_string();
    let row = run_db(&state, "Failed to update item", move |db| {
        match db.update_item(&item_id.to_string(), &changes, &actor, &details) {
            Ok(row) => Ok(Ok(row)),
            Err(e) if e.is::<LikesOverflow>() => {
                Ok(Err(ApiError::bad_request("Likes increment out of range")))
            }
            Err(e) => Err(e),
        }
    })
    .await??
    .ok_or(ApiError::NotFound("Item not found"))?;

    let item = item_from_row(row);
    info!("{} updated item {}", claims.email, item.id);
    announce(&state, ItemChange::Updated, item.id, Some(item.clone())).await;

    Ok(Json(ItemResponse {
        data: item,
        message: None,
    }))
}

/// DELETE /api/items/{id}: admins only, decided by the verified token.
///
/// Older clients send `{"role": "..."}` in the body. It is accepted, but it
/// can only agree with the token role; a mismatch is refused.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let asserted = parse_delete_body(&body)?;
    if asserted
        .role
        .as_deref()
        .is_some_and(|role| role != claims.role.as_str())
    {
        warn!(
            "{} asserted role {:?} but holds {}",
            claims.email, asserted.role, claims.role
        );
        return Err(ApiError::Forbidden("Admin access required"));
    }

    let item_id = parse_item_id(&id)?;
    let actor = claims.sub.to_string();
    run_db(&state, "Failed to delete item", move |db| {
        db.delete_item(&item_id.to_string(), &actor)
    })
    .await?
    .ok_or(ApiError::NotFound("Item not found"))?;

    info!("{} deleted item {}", claims.email, item_id);
    announce(&state, ItemChange::Deleted, item_id, None).await;

    Ok(Json(MessageResponse {
        message: "Item deleted".into(),
    }))
}

/// POST /api/items/{id}/upload: multipart with a `file` field. Stores the
/// file under the upload directory and points the item's image at it.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> ApiResult<Json<ItemResponse>> {
    let item_id = parse_item_id(&id)?;

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((original_name, data));
        break;
    }
    let (original_name, data) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    // Check before touching the disk so unknown ids leave nothing behind.
    let exists = run_db(&state, "Upload failed", move |db| {
        Ok(db.get_item(&item_id.to_string())?.is_some())
    })
    .await?;
    if !exists {
        return Err(ApiError::NotFound("Item not found"));
    }

    let upload_dir = state.config.upload_dir.clone();
    let file_name = uploads::save(&upload_dir, &original_name, &data)
        .await
        .map_err(ApiError::internal("Upload failed"))?;
    let image_url = uploads::public_url(&file_name);

    let details = json!({ "imageUrl": image_url });
    let changes = ItemChanges {
        image_url: Some(image_url),
        ..Default::default()
    };
    let actor = claims.sub.to_string();
    let updated = run_db(&state, "Upload failed", move |db| {
        db.update_item(&item_id.to_string(), &changes, &actor, &details)
    })
    .await;

    let row = match updated {
        Ok(Some(row)) => row,
        Ok(None) => {
            // Deleted while the file was being written
            uploads::discard(&upload_dir, &file_name).await;
            return Err(ApiError::NotFound("Item not found"));
        }
        Err(e) => {
            uploads::discard(&upload_dir, &file_name).await;
            return Err(e);
        }
    };

    let item = item_from_row(row);
    info!("{} attached {} to item {}", claims.email, file_name, item.id);
    announce(&state, ItemChange::Updated, item.id, Some(item.clone())).await;

    Ok(Json(ItemResponse {
        data: item,
        message: Some("File uploaded successfully".into()),
    }))
}

/// Tell gateway clients about a change and note it in the recent cache.
async fn announce(state: &AppState, change: ItemChange, item_id: Uuid, item: Option<Item>) {
    state.recent.record(item_id.to_string()).await;
    let delivered = state
        .dispatcher
        .broadcast(GatewayEvent::item_changed(change, item_id, item));
    debug!("Item {} {:?} announced to {} clients", item_id, change, delivered);
}

/// Lenient positive integer: anything unparseable or below 1 means `default`.
fn parse_count(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(default)
}

/// A JSON object in `q` is a structured filter over a fixed field set; any
/// other text is a title substring.
fn parse_search(q: Option<&str>) -> ApiResult<ItemSearch> {
    let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(ItemSearch::default());
    };

    match serde_json::from_str::<serde_json::Value>(q) {
        Ok(value @ serde_json::Value::Object(_)) => {
            let filter: ItemFilter = serde_json::from_value(value)
                .map_err(|e| ApiError::bad_request(format!("Unsupported search filter: {}", e)))?;
            Ok(ItemSearch {
                title: filter.title,
                description: filter.description,
                created_by: filter.created_by.map(|id| id.to_string()),
            })
        }
        _ => Ok(ItemSearch {
            title: Some(q.to_string()),
            ..Default::default()
        }),
    }
}

fn parse_delete_body(body: &[u8]) -> ApiResult<DeleteItemRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeleteItemRequest::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Malformed request body"))
}

/// Ids are UUIDs; anything else cannot name an item.
fn parse_item_id(raw: &str) -> ApiResult<Uuid> {
    raw.parse().map_err(|_| ApiError::NotFound("Item not found"))
}

/// Random extra latency for about 30% of listings, between 200 and 800 ms.
fn simulated_latency() -> Option<Duration> {
    let mut rng = rand::rng();
    rng.random_bool(0.3)
        .then(|| Duration::from_millis(rng.random_range(200..800)))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::bad_request(format!("Invalid upload: {}", e.body_text()))
    }
}

pub fn item_from_row(row: ItemRow) -> Item {
    Item {
        id: parse_uuid(&row.id, "id", &row.id),
        created_by: Owner {
            id: parse_uuid(&row.created_by, "created_by", &row.id),
            name: row.owner_name,
            email: row.owner_email,
        },
        created_at: parse_time(&row.created_at, "created_at", &row.id),
        updated_at: parse_time(&row.updated_at, "updated_at", &row.id),
        title: row.title,
        description: row.description,
        image_url: row.image_url,
        views: row.views,
        likes: row.likes,
    }
}

fn parse_uuid(raw: &str, column: &str, item_id: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on item '{}': {}", column, raw, item_id, e);
        Uuid::default()
    })
}

fn parse_time(raw: &str, column: &str, item_id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on item '{}': {}", column, raw, item_id, e);
        chrono::DateTime::default()
    })
}
