//! Health check

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness check, always OK while the service runs
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{app, get_json};
    use axum::http::StatusCode;
    use planwise_billing::InMemoryGateway;

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(InMemoryGateway::new(), false, None), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
