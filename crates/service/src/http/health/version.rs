use axum::Json;
use common::version::{build_info, BuildInfo};

/// Name, version and build profile of the running gateway.
pub async fn handler() -> Json<BuildInfo> {
    Json(build_info())
}
