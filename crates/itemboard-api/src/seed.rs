//! Demo accounts and sample items for a fresh database.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use itemboard_db::{Database, ItemSearch, NewItem, NewUser};
use itemboard_types::models::Role;

use crate::auth::hash_password;

const ACCOUNTS: &[(&str, &str, &str, Role)] = &[
    ("admin@example.com", "AdminPass123!", "Admin User", Role::Admin),
    ("editor@example.com", "EditorPass123!", "Editor User", Role::Editor),
    ("user@example.com", "UserPass123!", "Regular User", Role::User),
];

/// (title, description, owned by the admin)
const ITEMS: &[(&str, &str, bool)] = &[
    (
        "Getting Started with Node.js",
        "Learn the basics of Node.js and build your first server",
        true,
    ),
    ("React Best Practices", "Tips and tricks for writing clean React code", false),
    ("MongoDB Schema Design", "How to design efficient MongoDB schemas", true),
    (
        "Testing JavaScript Applications",
        "Unit testing, integration testing, and E2E testing strategies",
        false,
    ),
    ("Docker for Developers", "Containerize your applications with Docker", true),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub items_created: usize,
}

/// Insert the demo accounts that do not exist yet, then the sample items if
/// the item table is empty. Safe to run repeatedly.
pub fn seed(db: &Database) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for &(email, password, name, role) in ACCOUNTS {
        if db.get_user_by_email(email)?.is_some() {
            info!("Seed: {} already exists", email);
            continue;
        }
        let created = db.create_user(&NewUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            name: name.to_string(),
            role,
        })?;
        if created {
            info!("Seed: created {} ({})", email, role);
            report.users_created += 1;
        }
    }

    let (_, existing) = db.list_items(&ItemSearch::default(), 0, 1)?;
    if existing > 0 {
        info!("Seed: {} items present, leaving them alone", existing);
        return Ok(report);
    }

    let admin = db
        .get_user_by_email(ACCOUNTS[0].0)?
        .context("admin account missing after seeding")?;
    let editor = db
        .get_user_by_email(ACCOUNTS[1].0)?
        .context("editor account missing after seeding")?;

    for &(title, description, by_admin) in ITEMS {
        let owner = if by_admin { &admin.id } else { &editor.id };
        db.create_item(
            &NewItem {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                description: description.to_string(),
                created_by: owner.clone(),
            },
            &json!({ "title": title, "description": description, "seed": true }),
        )?;
        report.items_created += 1;
    }

    info!(
        "Seed: {} users and {} items created",
        report.users_created, report.items_created
    );
    Ok(report)
}
