//! services/board/src/web/rest.rs
//!
//! Contains the Axum handlers through which the front-end issues its intents,
//! and the master definition for the OpenAPI specification. Every failure is
//! turned into a human-readable message; none of them is fatal.

use crate::web::protocol::{
    BoardEntryDto, BoardViewDto, DeleteResponse, ErrorResponse, LikeResponse, NoteDto,
    PaginationDto, SearchRequest, ThreadViewDto,
};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use secretboard_core::domain::{Color, ImageUpload, NoteDraft};
use secretboard_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_board_handler,
        search_handler,
        next_page_handler,
        previous_page_handler,
        create_note_handler,
        delete_note_handler,
        toggle_like_handler,
        report_note_handler,
        open_thread_handler,
        get_thread_handler,
        close_thread_handler,
    ),
    components(
        schemas(
            NoteDto, BoardEntryDto, PaginationDto, BoardViewDto, ThreadViewDto,
            SearchRequest, LikeResponse, DeleteResponse, ErrorResponse
        )
    ),
    tags(
        (name = "SecretBoard API", description = "Intents issued by the anonymous board front-end.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Conversion
//=========================================================================================

pub type Rejection = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, message: impl Into<String>) -> Rejection {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn port_failure(e: PortError) -> Rejection {
    let status = match &e {
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Upload(_) => StatusCode::BAD_GATEWAY,
        PortError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Board operation failed: {:?}", e);
    } else {
        warn!("Board operation rejected: {}", e);
    }
    reject(status, e.to_string())
}

fn board_json(
    app_state: &AppState,
    view: secretboard_core::view::BoardView,
) -> Json<BoardViewDto> {
    Json(BoardViewDto::from_view(view, app_state.client.session()))
}

//=========================================================================================
// Board
//=========================================================================================

/// The board page as currently derived.
#[utoipa::path(
    get,
    path = "/board",
    responses((status = 200, description = "The current board page", body = BoardViewDto))
)]
pub async fn get_board_handler(State(app_state): State<Arc<AppState>>) -> Json<BoardViewDto> {
    let view = app_state.client.board_view().await;
    board_json(&app_state, view)
}

/// Narrows the loaded page to notes matching the query.
#[utoipa::path(
    post,
    path = "/board/search",
    request_body = SearchRequest,
    responses((status = 200, description = "The filtered board page", body = BoardViewDto))
)]
pub async fn search_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Json<BoardViewDto> {
    let view = app_state.client.set_search(&req.query).await;
    board_json(&app_state, view)
}

#[utoipa::path(
    post,
    path = "/board/next",
    responses(
        (status = 200, description = "The next page, or the current one on the last page", body = BoardViewDto),
        (status = 500, description = "The page could not be fetched", body = ErrorResponse)
    )
)]
pub async fn next_page_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<BoardViewDto>, Rejection> {
    let view = app_state.client.next_page().await.map_err(port_failure)?;
    Ok(board_json(&app_state, view))
}

#[utoipa::path(
    post,
    path = "/board/previous",
    responses(
        (status = 200, description = "The previous page, or the first one", body = BoardViewDto),
        (status = 500, description = "The page could not be fetched", body = ErrorResponse)
    )
)]
pub async fn previous_page_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<BoardViewDto>, Rejection> {
    let view = app_state.client.previous_page().await.map_err(port_failure)?;
    Ok(board_json(&app_state, view))
}

//=========================================================================================
// Notes
//=========================================================================================

/// Posts a note or a reply.
///
/// Accepts multipart/form-data with the text fields `message`, `color`,
/// `recipient`, `from_sender`, `replying_to_id` and an optional `image` file.
/// The image is stored first; if that fails, no note is created.
#[utoipa::path(
    post,
    path = "/notes",
    request_body(content_type = "multipart/form-data", description = "The note fields and optional image."),
    responses(
        (status = 201, description = "Note created", body = NoteDto),
        (status = 400, description = "Invalid note", body = ErrorResponse),
        (status = 502, description = "Image upload failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_note_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let mut draft = NoteDraft::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| {
                reject(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read image bytes: {}", e),
                )
            })?;
            if !data.is_empty() {
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            continue;
        }

        let text = field.text().await.map_err(|e| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Field '{}' is not valid text: {}", name, e),
            )
        })?;
        match name.as_str() {
            "message" => draft.message = text,
            "color" if !text.trim().is_empty() => {
                draft.color = text.parse::<Color>().map_err(port_failure)?;
            }
            "recipient" => draft.recipient = Some(text),
            "from_sender" => draft.from_sender = Some(text),
            "replying_to_id" if !text.trim().is_empty() => {
                let parent_id = Uuid::parse_str(text.trim()).map_err(|_| {
                    reject(StatusCode::BAD_REQUEST, "Invalid replying_to_id format")
                })?;
                draft.replying_to_id = Some(parent_id);
            }
            _ => {}
        }
    }

    let note = app_state
        .client
        .create_note(draft, image)
        .await
        .map_err(port_failure)?;
    let dto = NoteDto::from_note(&note, app_state.client.session());
    Ok((StatusCode::CREATED, Json(dto)))
}

/// Deletes a note owned by this session. Anything else is a silent no-op.
#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "The note to delete.")),
    responses(
        (status = 200, description = "Whether a note was deleted", body = DeleteResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn delete_note_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, Rejection> {
    let deleted = app_state
        .client
        .delete_note(id)
        .await
        .map_err(port_failure)?;
    Ok(Json(DeleteResponse { deleted }))
}

#[utoipa::path(
    post,
    path = "/notes/{id}/like",
    params(("id" = Uuid, Path, description = "The note to like or unlike.")),
    responses(
        (status = 200, description = "The like state after toggling", body = LikeResponse),
        (status = 404, description = "Note not found", body = ErrorResponse)
    )
)]
pub async fn toggle_like_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeResponse>, Rejection> {
    let toggle = app_state
        .client
        .toggle_like(id)
        .await
        .map_err(port_failure)?;
    Ok(Json(toggle.into()))
}

#[utoipa::path(
    post,
    path = "/notes/{id}/report",
    params(("id" = Uuid, Path, description = "The note to report.")),
    responses(
        (status = 204, description = "Report recorded"),
        (status = 404, description = "Note not found", body = ErrorResponse)
    )
)]
pub async fn report_note_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    app_state
        .client
        .report_note(id)
        .await
        .map_err(port_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Reply Threads
//=========================================================================================

/// Opens the reply view of a top-level note; its replies are pushed on change.
#[utoipa::path(
    post,
    path = "/threads/{id}",
    params(("id" = Uuid, Path, description = "The top-level note whose replies to show.")),
    responses(
        (status = 200, description = "The replies, oldest first", body = ThreadViewDto),
        (status = 400, description = "The note is itself a reply", body = ErrorResponse),
        (status = 404, description = "Note not found", body = ErrorResponse)
    )
)]
pub async fn open_thread_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ThreadViewDto>, Rejection> {
    let view = app_state
        .client
        .open_thread(id)
        .await
        .map_err(port_failure)?;
    Ok(Json(ThreadViewDto::from_view(view, app_state.client.session())))
}

#[utoipa::path(
    get,
    path = "/thread",
    responses(
        (status = 200, description = "The open reply thread", body = ThreadViewDto),
        (status = 404, description = "No thread is open", body = ErrorResponse)
    )
)]
pub async fn get_thread_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ThreadViewDto>, Rejection> {
    let view = app_state
        .client
        .thread_view()
        .await
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "No reply thread is open"))?;
    Ok(Json(ThreadViewDto::from_view(view, app_state.client.session())))
}

#[utoipa::path(
    delete,
    path = "/thread",
    responses((status = 204, description = "Thread closed"))
)]
pub async fn close_thread_handler(State(app_state): State<Arc<AppState>>) -> StatusCode {
    app_state.client.close_thread().await;
    StatusCode::NO_CONTENT
}
