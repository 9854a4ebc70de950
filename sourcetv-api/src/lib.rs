// SourceTV API Library
//
// HTTP front end over the resolution, provider and proxy services

pub mod http;

pub use http::{create_router, AppState};
