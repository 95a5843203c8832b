// Application layer - View building, registry and streaming orchestration
pub mod channel_source;
pub mod streaming_service;
pub mod view_registry;
pub mod view_service;
