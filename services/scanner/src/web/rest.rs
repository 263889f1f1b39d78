//! services/scanner/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::decoder::luma_frame_from_image;
use crate::scan::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use veritrace_core::domain::Resolution;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        verify_code_handler,
        verify_image_handler,
    ),
    components(
        schemas(VerifyResponse)
    ),
    tags(
        (name = "Veritrace Scanner API", description = "API endpoints for product code verification.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after a code resolved to a record.
#[derive(Serialize, ToSchema)]
pub struct VerifyResponse {
    record_id: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Verify a typed product code.
///
/// The manual alternative to scanning: the code is resolved through the
/// same lookup as a scanned QR payload.
#[utoipa::path(
    get,
    path = "/verify/{code}",
    responses(
        (status = 200, description = "Code resolved to a record", body = VerifyResponse),
        (status = 404, description = "No record carries this code"),
        (status = 502, description = "The lookup backend failed")
    ),
    params(
        ("code" = String, Path, description = "The product code to verify.")
    )
)]
pub async fn verify_code_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    resolve_payload(&app_state, &code).await
}

/// Verify a photographed QR label.
///
/// Accepts a multipart/form-data request with a single image part. The
/// image is decoded with the same decoder the live scanner uses, then the
/// payload is resolved as usual.
#[utoipa::path(
    post,
    path = "/verify/image",
    request_body(content_type = "multipart/form-data", description = "The label image to decode."),
    responses(
        (status = 200, description = "Code resolved to a record", body = VerifyResponse),
        (status = 400, description = "Bad request (e.g., missing image part)"),
        (status = 404, description = "No record carries this code"),
        (status = 422, description = "The upload is not a readable image or contains no QR code"),
        (status = 502, description = "The lookup backend failed")
    )
)]
pub async fn verify_image_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let image_data = if let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        field.bytes().await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read image bytes: {}", e),
            )
        })?
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include an image".to_string(),
        ));
    };

    let frame = luma_frame_from_image(&image_data).ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        "Uploaded file is not a readable image".to_string(),
    ))?;

    let code = app_state.decoder.decode(&frame).ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        "No QR code found in image".to_string(),
    ))?;

    resolve_payload(&app_state, &code.payload).await
}

/// Shared lookup tail of both verification paths.
async fn resolve_payload(
    app_state: &AppState,
    payload: &str,
) -> Result<(StatusCode, Json<VerifyResponse>), (StatusCode, String)> {
    match app_state.resolver.resolve(payload).await {
        Ok(Resolution::Found { record_id }) => {
            Ok((StatusCode::OK, Json(VerifyResponse { record_id })))
        }
        Ok(Resolution::NotFound) => Err((
            StatusCode::NOT_FOUND,
            "Invalid code! Product not found.".to_string(),
        )),
        Err(e) => {
            error!("Failed to verify code: {e}");
            Err((
                StatusCode::BAD_GATEWAY,
                "Error verifying code. Try again.".to_string(),
            ))
        }
    }
}
