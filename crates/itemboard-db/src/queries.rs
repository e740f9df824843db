use crate::models::{AuditLogRow, ItemRow, UserRow};
use crate::{Database, now_timestamp};
use anyhow::Result;
use itemboard_types::models::{AuditAction, Role};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, Row, Transaction, params, params_from_iter};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const ITEM_SELECT: &str = "SELECT i.id, i.title, i.description, i.image_url, i.views, i.likes,
        i.created_by, u.name, u.email, i.created_at, i.updated_at
     FROM items i
     LEFT JOIN users u ON u.id = i.created_by";

pub struct NewUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

pub struct NewItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_by: String,
}

/// Field changes applied by `update_item`. `None` leaves a column untouched.
#[derive(Debug, Default, Clone)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Added to the current like count.
    pub likes_delta: Option<i64>,
    pub image_url: Option<String>,
}

/// Returned (inside `anyhow::Error`) by `update_item` when a like increment
/// would leave the `i64` range. Nothing is written in that case.
#[derive(Debug, thiserror::Error)]
#[error("like count out of range")]
pub struct LikesOverflow;

/// Listing filter. Text fields are case-insensitive substring matches.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ItemSearch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` when the email is already taken.
    pub fn create_user(&self, user: &NewUser) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let res = conn.execute(
                "INSERT INTO users (id, email, password, name, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![user.id, user.email, user.password_hash, user.name, user.role.as_str(), now],
            );
            match res {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Items --

    /// Insert an item together with its CREATE_ITEM audit entry.
    pub fn create_item(&self, item: &NewItem, details: &serde_json::Value) -> Result<ItemRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO items (id, title, description, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![item.id, item.title, item.description, item.created_by, now],
            )?;
            insert_audit(&tx, AuditAction::CreateItem, &item.created_by, &item.id, details)?;

            let row = query_item(&tx, &item.id)?
                .ok_or_else(|| anyhow::anyhow!("Item {} vanished after insert", item.id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_item(&self, id: &str) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| query_item(conn, id))
    }

    /// One page of items, newest first, plus the total number of matches.
    pub fn list_items(&self, search: &ItemSearch, offset: u64, limit: u32) -> Result<(Vec<ItemRow>, u64)> {
        self.with_conn(|conn| {
            let (where_sql, mut values) = search_clause(search);

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM items i {}", where_sql),
                params_from_iter(values.iter()),
                |r| r.get(0),
            )?;

            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));
            let sql = format!(
                "{} {} ORDER BY i.created_at DESC, i.rowid DESC LIMIT ?{} OFFSET ?{}",
                ITEM_SELECT,
                where_sql,
                values.len() - 1,
                values.len()
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), item_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Apply `changes` and record an UPDATE_ITEM audit entry. Returns `None`
    /// if the item does not exist, in which case nothing is written.
    pub fn update_item(
        &self,
        id: &str,
        changes: &ItemChanges,
        actor_id: &str,
        details: &serde_json::Value,
    ) -> Result<Option<ItemRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = tx
                .query_row("SELECT likes FROM items WHERE id = ?1", [id], |row| row.get::<_, i64>(0))
                .optional()?
            else {
                return Ok(None);
            };
            // SQLite would silently promote an overflowing sum to REAL.
            let likes = match changes.likes_delta {
                Some(delta) => current.checked_add(delta).ok_or(LikesOverflow)?,
                None => current,
            };

            tx.execute(
                "UPDATE items SET
                    title       = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    likes       = ?4,
                    image_url   = COALESCE(?5, image_url),
                    updated_at  = ?6
                 WHERE id = ?1",
                params![
                    id,
                    changes.title,
                    changes.description,
                    likes,
                    changes.image_url,
                    now_timestamp()
                ],
            )?;

            insert_audit(&tx, AuditAction::UpdateItem, actor_id, id, details)?;
            let row = query_item(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Delete an item and record a DELETE_ITEM audit entry carrying its title.
    /// Returns the deleted row, or `None` if there was nothing to delete.
    pub fn delete_item(&self, id: &str, actor_id: &str) -> Result<Option<ItemRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(row) = query_item(&tx, id)? else {
                return Ok(None);
            };

            tx.execute("DELETE FROM items WHERE id = ?1", [id])?;
            let details = serde_json::json!({ "title": row.title });
            insert_audit(&tx, AuditAction::DeleteItem, actor_id, id, &details)?;
            tx.commit()?;
            Ok(Some(row))
        })
    }

    // -- Refresh tokens --

    /// Persist a refresh token. Only its SHA-256 is stored.
    pub fn store_refresh_token(&self, token: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![hash_token(token), user_id, expires_at, now_timestamp()],
            )?;
            Ok(())
        })
    }

    /// Swap `old` for `new` atomically. Returns `false` without writing when
    /// `old` is unknown, belongs to someone else, or has expired.
    pub fn rotate_refresh_token(&self, old: &str, new: &str, user_id: &str, expires_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            let removed = tx.execute(
                "DELETE FROM refresh_tokens WHERE token_hash = ?1 AND user_id = ?2 AND expires_at > ?3",
                params![hash_token(old), user_id, now],
            )?;
            if removed == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![hash_token(new), user_id, expires_at, now],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn refresh_token_is_active(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM refresh_tokens WHERE token_hash = ?1 AND expires_at > ?2",
                    params![hash_token(token), now_timestamp()],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Remove refresh tokens past their expiry. Returns how many were removed.
    pub fn purge_expired_refresh_tokens(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM refresh_tokens WHERE expires_at <= ?1", [now_timestamp()])?;
            Ok(n)
        })
    }

    // -- Audit log --

    /// Audit entries for one item, oldest first. Not exposed over HTTP.
    pub fn audit_logs_for_item(&self, item_id: &str) -> Result<Vec<AuditLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, action, user_id, item_id, details, created_at
                 FROM audit_logs WHERE item_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([item_id], |row| {
                    Ok(AuditLogRow {
                        id: row.get(0)?,
                        action: row.get(1)?,
                        user_id: row.get(2)?,
                        item_id: row.get(3)?,
                        details: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never caller input.
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, password, name, role, created_at, updated_at FROM users WHERE {} = ?1",
        column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                name: row.get(3)?,
                role: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_item(conn: &Connection, id: &str) -> Result<Option<ItemRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE i.id = ?1", ITEM_SELECT))?;
    let row = stmt.query_row([id], item_from_row).optional()?;
    Ok(row)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        image_url: row.get(3)?,
        views: row.get(4)?,
        likes: row.get(5)?,
        created_by: row.get(6)?,
        owner_name: row.get::<_, Option<String>>(7)?.unwrap_or_else(|| "unknown".to_string()),
        owner_email: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn insert_audit(
    tx: &Transaction<'_>,
    action: AuditAction,
    user_id: &str,
    item_id: &str,
    details: &serde_json::Value,
) -> Result<()> {
    tx.execute(
        "INSERT INTO audit_logs (id, action, user_id, item_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            action.as_str(),
            user_id,
            item_id,
            details.to_string(),
            now_timestamp()
        ],
    )?;
    Ok(())
}

/// Build the WHERE clause for a search plus its positional values.
fn search_clause(search: &ItemSearch) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(title) = &search.title {
        values.push(Value::Text(like_pattern(title)));
        clauses.push(format!("i.title LIKE ?{} ESCAPE '\\'", values.len()));
    }
    if let Some(description) = &search.description {
        values.push(Value::Text(like_pattern(description)));
        clauses.push(format!("i.description LIKE ?{} ESCAPE '\\'", values.len()));
    }
    if let Some(owner) = &search.created_by {
        values.push(Value::Text(owner.clone()));
        clauses.push(format!("i.created_by = ?{}", values.len()));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Substring pattern with LIKE wildcards in the input taken literally.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
