use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Item, Role, User};

// -- JWT Claims --

/// Claims carried by both access and refresh tokens. The two kinds are told
/// apart by the secret they are signed with, not by their contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    /// Random per-token id so that two tokens minted in the same second differ.
    pub jti: Uuid,
}

// -- Auth --

// Fields are optional so that a missing field maps to a 400 with a readable
// message instead of a deserialization rejection.

#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// -- Items --

#[derive(Debug, Default, Deserialize)]
pub struct CreateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Added to the stored like counter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
}

/// Optional body of `DELETE /api/items/{id}`. The role here can only confirm
/// the verified token role, never grant one. Kept as free text so that any
/// value, known role or not, is compared rather than rejected.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteItemRequest {
    pub role: Option<String>,
}

/// Raw query string of `GET /api/items`. Numbers are parsed leniently by the
/// handler, so they arrive as strings.
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub q: Option<String>,
}

/// Structured search accepted in `q` when it is a JSON object. Anything
/// outside this field set is rejected.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ItemFilter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemListResponse {
    pub data: Vec<Item>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemResponse {
    pub data: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Diagnostics --

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntryStatus {
    pub key: String,
    /// Milliseconds since the entry was recorded.
    pub age: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub cache_size: usize,
    pub entries: Vec<CacheEntryStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub connected_clients: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_filter_rejects_unknown_fields() {
        let ok: ItemFilter = serde_json::from_str(r#"{"title":"rust"}"#).unwrap();
        assert_eq!(ok.title.as_deref(), Some("rust"));

        let injected = serde_json::from_str::<ItemFilter>(r#"{"$where":"1"}"#);
        assert!(injected.is_err());

        let nested = serde_json::from_str::<ItemFilter>(r#"{"title":{"$ne":null}}"#);
        assert!(nested.is_err());
    }

    #[test]
    fn delete_body_role_is_free_text() {
        let req: DeleteItemRequest = serde_json::from_str(r#"{"role":"admin"}"#).unwrap();
        assert_eq!(req.role.as_deref(), Some("admin"));
        let req: DeleteItemRequest = serde_json::from_str(r#"{"role":"root"}"#).unwrap();
        assert_eq!(req.role.as_deref(), Some("root"));
        assert!(serde_json::from_str::<DeleteItemRequest>(r#"{"role":5}"#).is_err());
    }
}
