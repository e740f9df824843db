use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::debug;

use itemboard_gateway::connection;

use crate::middleware::{expose_error_detail, require_admin, require_auth, require_editor_or_admin};
use crate::rate_limit::{limit_api, limit_login};
use crate::state::AppState;
use crate::{auth, items, status, uploads};

/// Build the full application: JSON API under `/api`, the gateway socket on
/// `/ws`, uploaded files under `/uploads` and, when configured, the client
/// bundle for everything else.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route(
            "/auth/login",
            post(auth::login).route_layer(from_fn_with_state(state.clone(), limit_login)),
        )
        .route("/auth/refresh", post(auth::refresh))
        .route("/items", get(items::list_items))
        .route("/items/{id}", get(items::get_item))
        .route("/cache-status", get(status::cache_status))
        .route("/health", get(status::health));

    let editor = Router::new()
        .route("/items", post(items::create_item))
        .route("/items/{id}", put(items::update_item))
        .route(
            "/items/{id}/upload",
            post(items::upload_image).layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route_layer(from_fn(require_editor_or_admin));

    let admin = Router::new()
        .route("/items/{id}", delete(items::delete_item))
        .route_layer(from_fn(require_admin));

    // Role checks run after authentication has put the claims in place.
    let protected = editor
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api = public
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), limit_api));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let mut app = Router::new()
        .nest("/api", api)
        .route("/ws", get(ws_upgrade))
        .nest_service(uploads::PUBLIC_PREFIX, ServeDir::new(&state.config.upload_dir));

    if let Some(dir) = &state.config.static_dir {
        debug!("Serving client bundle from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))));
    }

    app.layer(from_fn_with_state(state.clone(), expose_error_detail))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher))
}
