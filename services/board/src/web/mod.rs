pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use crate::adapters::images::IMAGES_ROUTE;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Images larger than this are rejected before they reach the bucket.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Builds the full router: intents, the view push socket, the image bucket
/// and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let bucket = ServeDir::new(&app_state.config.image_bucket_path);

    let api_router = Router::new()
        .route("/board", get(rest::get_board_handler))
        .route("/board/search", post(rest::search_handler))
        .route("/board/next", post(rest::next_page_handler))
        .route("/board/previous", post(rest::previous_page_handler))
        .route("/notes", post(rest::create_note_handler))
        .route("/notes/{id}", delete(rest::delete_note_handler))
        .route("/notes/{id}/like", post(rest::toggle_like_handler))
        .route("/notes/{id}/report", post(rest::report_note_handler))
        .route("/threads/{id}", post(rest::open_thread_handler))
        .route(
            "/thread",
            get(rest::get_thread_handler).delete(rest::close_thread_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .nest_service(IMAGES_ROUTE, bucket)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
