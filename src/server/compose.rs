use axum::http::StatusCode;
use tracing::{error, info};

use crate::codec;
use crate::compose::{Composite, render_captions, render_layers};
use crate::error::CompositeError;

use super::models::{AddTextRequest, CaptionRequest, ComposeResponse, ErrorResponse};
use super::state::ServerState;

const RENDER_FAILED: &str = "Failed to add text to image";

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
    pub(crate) details: Option<String>,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    fn internal(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: RENDER_FAILED.to_string(),
            details: Some(details.into()),
        }
    }

    pub(crate) fn body(self) -> ErrorResponse {
        ErrorResponse {
            error: self.message,
            details: self.details,
        }
    }
}

impl From<CompositeError> for ServerError {
    fn from(err: CompositeError) -> Self {
        if err.is_client_error() {
            ServerError::bad_request(err.to_string())
        } else {
            ServerError::internal(err.to_string())
        }
    }
}

pub(crate) async fn add_text_request(
    state: &ServerState,
    request: AddTextRequest,
) -> Result<ComposeResponse, ServerError> {
    let image_url = request
        .image_url
        .filter(|value| !value.trim().is_empty());
    let layers = request.text_layers.unwrap_or_default();
    let Some(image_url) = image_url.filter(|_| !layers.is_empty()) else {
        return Err(ServerError::bad_request(
            "Image URL and text layers are required",
        ));
    };
    info!(
        "adding text to image {} ({} layer(s))",
        preview(&image_url),
        layers.len()
    );

    let surface = codec::decode(&image_url).await.map_err(log_failure)?;
    let fonts = state.fonts.clone();
    let composite = tokio::task::spawn_blocking(move || render_layers(surface, &layers, &fonts))
        .await
        .map_err(|err| ServerError::internal(format!("render task failed: {}", err)))?
        .map_err(log_failure)?;
    Ok(respond(composite))
}

pub(crate) async fn captions_request(
    state: &ServerState,
    request: CaptionRequest,
) -> Result<ComposeResponse, ServerError> {
    let Some(image) = request.image.filter(|value| !value.trim().is_empty()) else {
        return Err(ServerError::bad_request("image is required"));
    };
    let captions = request.captions.unwrap_or_default();
    info!(
        "adding {} caption(s) to image {}",
        captions.len(),
        preview(&image)
    );

    let surface = codec::decode(&image).await.map_err(log_failure)?;
    let fonts = state.fonts.clone();
    let family = state.settings.fonts.caption_family.clone();
    let composite = tokio::task::spawn_blocking(move || {
        render_captions(surface, &captions, &fonts, &family)
    })
    .await
    .map_err(|err| ServerError::internal(format!("render task failed: {}", err)))?
    .map_err(log_failure)?;
    Ok(respond(composite))
}

fn respond(composite: Composite) -> ComposeResponse {
    ComposeResponse {
        success: true,
        warnings: composite.report.warnings(),
        image: composite.image,
    }
}

fn log_failure(err: CompositeError) -> ServerError {
    if !err.is_client_error() {
        error!("error adding text to image: {}", err);
    }
    ServerError::from(err)
}

fn preview(source: &str) -> String {
    let head: String = source.chars().take(50).collect();
    if head.len() < source.len() {
        format!("{}...", head)
    } else {
        head
    }
}
