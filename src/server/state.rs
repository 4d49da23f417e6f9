use std::sync::Arc;

use crate::render::FontBook;
use crate::settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: settings::Settings,
    pub(crate) fonts: Arc<FontBook>,
}
