// Application state for HTTP handlers
use crate::application::streaming_service::StreamingViewService;
use crate::application::view_service::ViewService;
use crate::infrastructure::config::TimestampFormat;

#[derive(Clone)]
pub struct AppState {
    pub view_service: ViewService,
    pub streaming_service: StreamingViewService,
    pub timestamp_format: TimestampFormat,
}
