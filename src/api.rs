// 🌐 REST API with Axum
// /price, /ela, /plot over the shared read-only dataset

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Query, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::chart::render_area_chart;
use crate::dataset::{format_float, Dataset, Observation, DATE_FORMAT};
use crate::error::AnalysisError;
use crate::regression::{elasticity_summary, Coefficient};
use crate::transform::Column;

/// Shared application state. The dataset is immutable, so no lock.
#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<Dataset>,
}

impl AppState {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Computation(AnalysisError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Computation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Computation(_) => "computation_error",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::EmptySelection { .. } => Self::NotFound(err.to_string()),
            AnalysisError::Encoding(_) => Self::Internal(err.to_string()),
            other => Self::Computation(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
        } else {
            warn!(kind = self.kind(), "{}", self);
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct AreaRequest {
    area: Option<String>,
}

/// The requested area: `?area=` on GET, `{"area": ...}` JSON body otherwise
#[derive(Debug, Clone, PartialEq)]
pub struct AreaParam(pub String);

#[async_trait]
impl<S> FromRequest<S> for AreaParam
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request: AreaRequest = if req.method() == Method::GET {
            let Query(query) = Query::<AreaRequest>::try_from_uri(req.uri())
                .map_err(|e| ApiError::InvalidInput(e.body_text()))?;
            query
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidInput(e.body_text()))?;
            serde_json::from_slice(&body)
                .map_err(|e| ApiError::InvalidInput(format!("malformed request body: {}", e)))?
        };

        request
            .area
            .map(AreaParam)
            .ok_or_else(|| ApiError::InvalidInput("missing \"area\" field".to_string()))
    }
}

/// Latest price row. Every field is a string.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PriceResponse {
    pub date: String,
    pub area: String,
    #[serde(rename = "area code")]
    pub area_code: String,
    #[serde(rename = "average price")]
    pub average_price: String,
    #[serde(rename = "number of crimes")]
    pub number_of_crimes: String,
}

impl From<&Observation> for PriceResponse {
    fn from(row: &Observation) -> Self {
        Self {
            date: format!("{} 00:00:00", row.date.format(DATE_FORMAT)),
            area: row.area.clone(),
            area_code: row.code.clone(),
            average_price: format_float(Column::AveragePrice.get(row)),
            number_of_crimes: format_float(Column::NoOfCrimes.get(row)),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rows": state.dataset.len(),
    }))
}

/// GET /areas - Every area name in the dataset
async fn list_areas(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.dataset.areas())
}

/// GET|POST /price - Latest average price for an area
async fn latest_price(
    State(state): State<AppState>,
    AreaParam(area): AreaParam,
) -> Result<Json<PriceResponse>, ApiError> {
    let rows = state.dataset.latest_for_area(&area);
    let row = rows.first().ok_or_else(|| {
        ApiError::NotFound(format!("no rows for area {:?} at the latest date", area))
    })?;

    Ok(Json(PriceResponse::from(*row)))
}

/// GET|POST /ela - Price elasticity coefficients for an area
async fn price_elasticity(
    State(state): State<AppState>,
    AreaParam(area): AreaParam,
) -> Result<Json<Vec<Coefficient>>, ApiError> {
    let dataset = state.dataset.clone();
    let table = tokio::task::spawn_blocking(move || elasticity_summary(&dataset, &area))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(table))
}

/// GET|POST /plot - Standardized price / sales chart as PNG
async fn time_series_plot(
    State(state): State<AppState>,
    AreaParam(area): AreaParam,
) -> Result<Response, ApiError> {
    if !state.dataset.contains_area(&area) {
        return Err(ApiError::NotFound(format!("unknown area {:?}", area)));
    }

    let dataset = state.dataset.clone();
    let png = tokio::task::spawn_blocking(move || render_area_chart(&dataset, &area))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"plot.png\""),
        ],
        png,
    )
        .into_response())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/areas", get(list_areas))
        .route("/price", get(latest_price).post(latest_price))
        .route("/ela", get(price_elasticity).post(price_elasticity))
        .route("/plot", get(time_series_plot).post(time_series_plot))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample_dataset;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(sample_dataset()))
    }

    fn post(uri: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(req: HttpRequest<Body>) -> (StatusCode, Vec<u8>) {
        let response = app().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn send_json(req: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_price_latest_row() {
        let (status, body) = send_json(post("/price", r#"{"area": "Camden"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["area"], "Camden");
        assert_eq!(body["date"], "2020-01-01 00:00:00");
        assert_eq!(body["area code"], "E09000007");
        assert_eq!(body["average price"], "845000.0");
        assert_eq!(body["number of crimes"], "2150.0");
    }

    #[tokio::test]
    async fn test_price_missing_crimes_renders_nan() {
        let (status, body) = send_json(post("/price", r#"{"area": "Westminster"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["number of crimes"], "nan");
    }

    #[tokio::test]
    async fn test_price_via_query_string() {
        let (status, body) = send_json(get_request("/price?area=Hackney")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["area"], "Hackney");
    }

    #[tokio::test]
    async fn test_price_not_found() {
        // unknown area
        let (status, body) = send_json(post("/price", r#"{"area": "Atlantis"}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        // known area with no row at the latest date
        let (status, _) = send_json(post("/price", r#"{"area": "Barnet"}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let (status, body) = send_json(post("/price", r#"{}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");

        let (status, _) = send_json(post("/ela", r#"{"area": 42}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(post("/plot", "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(get_request("/ela")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ela_two_rows() {
        let (status, body) = send_json(post("/ela", r#"{"area": "Hackney"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["var"], "Intercept");
        assert_eq!(rows[1]["var"], "log(Price)");
        assert!(rows[0]["coef"].is_f64());
        assert!(rows[1]["pvalue"].is_f64());
    }

    #[tokio::test]
    async fn test_ela_via_query_string() {
        let (status, body) = send_json(get_request("/ela?area=Hackney")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["var"], "log(Price)");
    }

    #[tokio::test]
    async fn test_ela_two_rows_has_null_pvalues() {
        let (status, body) = send_json(post("/ela", r#"{"area": "Pair"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["pvalue"].is_null()));
        assert!(rows.iter().all(|r| r["coef"].is_f64()));
    }

    #[tokio::test]
    async fn test_ela_all_sales_missing() {
        let (status, body) = send_json(post("/ela", r#"{"area": "Nosales"}"#)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "computation_error");
        assert!(body["message"].as_str().unwrap().contains("got 0"));
    }

    #[tokio::test]
    async fn test_ela_errors() {
        let (status, _) = send_json(post("/ela", r#"{"area": "Atlantis"}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send_json(post("/ela", r#"{"area": "Tiny"}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "computation_error");
    }

    #[tokio::test]
    async fn test_plot_png() {
        let response = app()
            .oneshot(post("/plot", r#"{"area": "Camden"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_plot_via_query_string() {
        let response = app().oneshot(get_request("/plot?area=Hackney")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_plot_unknown_area() {
        let (status, _) = send(post("/plot", r#"{"area": "Atlantis"}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_areas() {
        let (status, body) = send_json(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"], 21);

        let (_, body) = send_json(get_request("/areas")).await;
        assert_eq!(body.as_array().unwrap().len(), 7);
    }
}
