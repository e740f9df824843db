//! Database row types. These map directly to SQLite rows and stay
//! independent of the API models in itemboard-types.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Item joined with the name and email of its owner.
#[derive(Debug)]
pub struct ItemRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub created_by: String,
    pub owner_name: String,
    pub owner_email: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AuditLogRow {
    pub id: String,
    pub action: String,
    pub user_id: String,
    pub item_id: Option<String>,
    pub details: String,
    pub created_at: String,
}
