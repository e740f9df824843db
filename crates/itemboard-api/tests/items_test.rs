//! Item CRUD, role checks, search and uploads.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use itemboard_types::events::GatewayEvent;
use itemboard_types::models::Role;

#[tokio::test]
async fn editor_creates_and_reads_an_item() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;

    let created = app
        .request(
            "POST",
            "/api/items",
            Some(json!({ "title": "T", "description": "D" })),
            Some(&token),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let item = &created.body["data"];
    assert_eq!(item["title"], "T");
    assert_eq!(item["description"], "D");
    assert_eq!(item["views"], 0);
    assert_eq!(item["likes"], 0);
    assert_eq!(item["createdBy"]["email"], "ed@example.com");
    assert!(item.get("imageUrl").is_none());

    let id = item["id"].as_str().unwrap();
    let fetched = app.request("GET", &format!("/api/items/{}", id), None, None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["data"]["title"], "T");
    assert_eq!(fetched.body["data"]["views"], 0);
}

#[tokio::test]
async fn create_requires_title_and_description() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;

    let response = app
        .request("POST", "/api/items", Some(json!({ "title": "T" })), Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn writes_need_a_token_and_an_editor_role() {
    let app = TestApp::new();
    let body = json!({ "title": "T", "description": "D" });

    let anonymous = app.request("POST", "/api/items", Some(body.clone()), None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["error"], "No token provided");

    let garbage = app
        .request("POST", "/api/items", Some(body.clone()), Some("not-a-token"))
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["error"], "Invalid token");

    let token = app.token_for("ann@example.com", Role::User).await;
    let user = app.request("POST", "/api/items", Some(body), Some(&token)).await;
    assert_eq!(user.status, StatusCode::FORBIDDEN);
    assert_eq!(user.body["error"], "Editor or admin access required");
}

#[tokio::test]
async fn reads_are_public() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    app.create_item(&token, "Public", "Visible to all").await;

    let listed = app.request("GET", "/api/items", None, None).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["pagination"]["total"], 1);
}

#[tokio::test]
async fn update_increments_likes() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    let id = app.create_item(&token, "T", "D").await;
    let path = format!("/api/items/{}", id);

    let first = app.request("PUT", &path, Some(json!({ "likes": 1 })), Some(&token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"]["likes"], 1);

    let second = app
        .request("PUT", &path, Some(json!({ "likes": 2, "title": "T2" })), Some(&token))
        .await;
    assert_eq!(second.body["data"]["likes"], 3);
    assert_eq!(second.body["data"]["title"], "T2");
    assert_eq!(second.body["data"]["description"], "D");

    let missing = app
        .request(
            "PUT",
            &format!("/api/items/{}", uuid::Uuid::new_v4()),
            Some(json!({ "likes": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "Item not found");
}

#[tokio::test]
async fn admin_deletes_with_or_without_body_role() {
    let app = TestApp::new();
    let admin = app.token_for("root@example.com", Role::Admin).await;
    let first = app.create_item(&admin, "One", "D").await;
    let second = app.create_item(&admin, "Two", "D").await;

    let plain = app
        .request("DELETE", &format!("/api/items/{}", first), None, Some(&admin))
        .await;
    assert_eq!(plain.status, StatusCode::OK);
    assert_eq!(plain.body["message"], "Item deleted");

    let asserted = app
        .request(
            "DELETE",
            &format!("/api/items/{}", second),
            Some(json!({ "role": "admin" })),
            Some(&admin),
        )
        .await;
    assert_eq!(asserted.status, StatusCode::OK);

    let gone = app.request("GET", &format!("/api/items/{}", first), None, None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let again = app
        .request("DELETE", &format!("/api/items/{}", first), None, Some(&admin))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn claimed_role_in_body_grants_nothing() {
    let app = TestApp::new();
    let editor = app.token_for("ed@example.com", Role::Editor).await;
    let id = app.create_item(&editor, "Keep", "D").await;
    let path = format!("/api/items/{}", id);

    let response = app
        .request("DELETE", &path, Some(json!({ "role": "admin" })), Some(&editor))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Admin access required");

    let still_there = app.request("GET", &path, None, None).await;
    assert_eq!(still_there.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_body_role_must_agree() {
    let app = TestApp::new();
    let admin = app.token_for("root@example.com", Role::Admin).await;
    let id = app.create_item(&admin, "Keep", "D").await;

    let response = app
        .request(
            "DELETE",
            &format!("/api/items/{}", id),
            Some(json!({ "role": "user" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // Values outside the known roles are a mismatch too, not a parse error.
    let response = app
        .request(
            "DELETE",
            &format!("/api/items/{}", id),
            Some(json!({ "role": "superuser" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Admin access required");

    let still_there = app.request("GET", &format!("/api/items/{}", id), None, None).await;
    assert_eq!(still_there.status, StatusCode::OK);
}

#[tokio::test]
async fn like_overflow_is_a_client_error() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    let id = app.create_item(&token, "Popular", "D").await;
    let path = format!("/api/items/{}", id);

    let maxed = app
        .request("PUT", &path, Some(json!({ "likes": i64::MAX })), Some(&token))
        .await;
    assert_eq!(maxed.status, StatusCode::OK);

    let over = app.request("PUT", &path, Some(json!({ "likes": 1 })), Some(&token)).await;
    assert_eq!(over.status, StatusCode::BAD_REQUEST);
    assert_eq!(over.body["error"], "Likes increment out of range");

    let fetched = app.request("GET", &path, None, None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["data"]["likes"], i64::MAX);
}

#[tokio::test]
async fn bad_json_bodies_use_the_error_envelope() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;

    let mistyped = app
        .request(
            "POST",
            "/api/items",
            Some(json!({ "title": 5, "description": "D" })),
            Some(&token),
        )
        .await;
    assert_eq!(mistyped.status, StatusCode::BAD_REQUEST);
    assert!(mistyped.body["error"].is_string());

    let id = app.create_item(&token, "T", "D").await;
    let mistyped = app
        .request("PUT", &format!("/api/items/{}", id), Some(json!({ "likes": "lots" })), Some(&token))
        .await;
    assert_eq!(mistyped.status, StatusCode::BAD_REQUEST);
    assert!(mistyped.body["error"].is_string());
}

#[tokio::test]
async fn listing_paginates_newest_first() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    for n in 1..=5 {
        app.create_item(&token, &format!("Item {}", n), "D").await;
    }

    let page = app.request("GET", "/api/items?page=2&limit=2", None, None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["pagination"], json!({ "page": 2, "limit": 2, "total": 5 }));
    let titles: Vec<&str> = page.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Item 3", "Item 2"]);

    let lenient = app.request("GET", "/api/items?page=zero&limit=-4", None, None).await;
    assert_eq!(lenient.body["pagination"]["page"], 1);
    assert_eq!(lenient.body["pagination"]["limit"], 10);

    let capped = app.request("GET", "/api/items?limit=5000", None, None).await;
    assert_eq!(capped.body["pagination"]["limit"], 100);
}

#[tokio::test]
async fn search_by_text_and_by_filter() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    app.create_item(&token, "Rust ownership", "Borrowing rules").await;
    app.create_item(&token, "Go channels", "CSP in practice").await;

    let text = app.request("GET", "/api/items?q=rust", None, None).await;
    assert_eq!(text.body["pagination"]["total"], 1);
    assert_eq!(text.body["data"][0]["title"], "Rust ownership");

    // {"description":"csp"}
    let filter = app
        .request("GET", "/api/items?q=%7B%22description%22%3A%22csp%22%7D", None, None)
        .await;
    assert_eq!(filter.status, StatusCode::OK);
    assert_eq!(filter.body["pagination"]["total"], 1);
    assert_eq!(filter.body["data"][0]["title"], "Go channels");

    // {"password":"x"}
    let unknown = app
        .request("GET", "/api/items?q=%7B%22password%22%3A%22x%22%7D", None, None)
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    // "100%" must not act as a wildcard
    let literal = app.request("GET", "/api/items?q=100%25", None, None).await;
    assert_eq!(literal.body["pagination"]["total"], 0);
}

#[tokio::test]
async fn malformed_id_is_not_found() {
    let app = TestApp::new();
    let response = app.request("GET", "/api/items/not-a-uuid", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_attaches_image() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    let id = app.create_item(&token, "Pic", "D").await;

    let response = app
        .upload(&format!("/api/items/{}/upload", id), "cat photo.png", b"\x89PNG fake", &token)
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["message"], "File uploaded successfully");

    let url = response.body["data"]["imageUrl"].as_str().unwrap();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with("-cat_photo.png"));

    let stored = app.upload_dir.path().join(url.trim_start_matches("/uploads/"));
    assert_eq!(std::fs::read(stored).unwrap(), b"\x89PNG fake");

    let fetched = app.request("GET", &format!("/api/items/{}", id), None, None).await;
    assert_eq!(fetched.body["data"]["imageUrl"], url);
}

#[tokio::test]
async fn upload_to_unknown_item_stores_nothing() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;

    let response = app
        .upload(
            &format!("/api/items/{}/upload", uuid::Uuid::new_v4()),
            "a.png",
            b"data",
            &token,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(std::fs::read_dir(app.upload_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn upload_over_the_limit_is_rejected() {
    let app = TestApp::with_config(|c| c.max_upload_bytes = 64);
    let token = app.token_for("ed@example.com", Role::Editor).await;
    let id = app.create_item(&token, "Pic", "D").await;

    let response = app
        .upload(&format!("/api/items/{}/upload", id), "big.bin", &[0u8; 4096], &token)
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn mutations_are_broadcast() {
    let app = TestApp::new();
    let token = app.token_for("ed@example.com", Role::Editor).await;
    let mut events = app.state.dispatcher.subscribe();

    let id = app.create_item(&token, "Live", "D").await;

    let GatewayEvent::ItemUpdated(payload) = events.recv().await.unwrap();
    assert_eq!(payload["action"], "created");
    assert_eq!(payload["itemId"], id.as_str());
    assert_eq!(payload["item"]["title"], "Live");
}
