use axum::extract::State;
use axum::http::StatusCode;
use sqlx::PgPool;

/// Liveness probe; always OK
pub async fn healthz() -> &'static str {
    "OK"
}

/// Readiness probe; OK iff storage is reachable
pub async fn readyz(State(pool): State<PgPool>) -> (StatusCode, &'static str) {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
        }
    }
}
