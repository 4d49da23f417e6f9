use serde::{Deserialize, Serialize};

use crate::compose::{Caption, TextLayer};

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct AddTextRequest {
    pub(crate) image_url: Option<String>,
    pub(crate) text_layers: Option<Vec<TextLayer>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct CaptionRequest {
    pub(crate) image: Option<String>,
    pub(crate) captions: Option<Vec<Caption>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ComposeResponse {
    pub(crate) success: bool,
    pub(crate) image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<String>,
}
