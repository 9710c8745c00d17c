//! # API REST
//!
//! REST API implementation for MUAC.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! Uses `api-shared` for request/response types and `muac-core` for all business logic.

#![warn(rust_2018_idioms)]

use api_shared::{
    AtRiskPatientRes, AtRiskRes, BucketRes, ClassificationRes, ClassifiedMeasurementRes,
    ClassifyQuery, CreateMeasurementReq, CreatedLabelsRes, DashboardRes, DistributionRes,
    ErrorRes, HealthRes, HealthService, MeasurementRes, NearbyLocationRes, NearbyQuery,
    NearbyRes, OperatorActivityRes, OperatorsRes, RecentMeasurementRes, RecentRes,
    RecommendationRes, RegionBreakdownRes, RegionsRes, ReportQuery, SeverityLabelRes,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use muac_core::{
    data_dir_from_env_value, thresholds_from_env_values, CoreConfig, CoreError,
    MeasurementService, ProximityService, RecordId, ReportService, Stores,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorRes>);

/// Application state for the REST API server
///
/// Contains the core services shared by all request handlers. Each service holds the
/// configuration resolved at startup; handlers never read the environment.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    measurements: MeasurementService,
    reports: ReportService,
    proximity: ProximityService,
}

impl AppState {
    /// Builds the services over `stores`.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration resolved at startup
    /// * `stores` - Storage backends shared by all services
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self {
            measurements: MeasurementService::new(cfg.clone(), stores.clone()),
            reports: ReportService::new(cfg.clone(), stores.clone()),
            proximity: ProximityService::new(stores.locations),
            cfg,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        classify,
        create_measurement,
        get_measurement,
        reclassify_measurement,
        dashboard,
        regions,
        recent,
        at_risk,
        operators,
        nearby,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        ClassificationRes,
        CreateMeasurementReq,
        MeasurementRes,
        SeverityLabelRes,
        RecommendationRes,
        CreatedLabelsRes,
        ClassifiedMeasurementRes,
        BucketRes,
        DistributionRes,
        DashboardRes,
        RegionBreakdownRes,
        RegionsRes,
        RecentMeasurementRes,
        RecentRes,
        AtRiskPatientRes,
        AtRiskRes,
        OperatorActivityRes,
        OperatorsRes,
        NearbyLocationRes,
        NearbyRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/classify", get(classify))
        .route("/measurements", post(create_measurement))
        .route("/measurements/:id", get(get_measurement))
        .route("/measurements/:id/reclassify", post(reclassify_measurement))
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/regions", get(regions))
        .route("/reports/recent", get(recent))
        .route("/reports/at-risk", get(at_risk))
        .route("/reports/operators", get(operators))
        .route("/locations/nearby", get(nearby))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves the core configuration from `MUAC_DATA_DIR` and the threshold variables.
///
/// # Errors
///
/// Returns an error if a threshold variable is not a number or the thresholds are not ordered.
pub fn config_from_env() -> anyhow::Result<CoreConfig> {
    let data_dir = data_dir_from_env_value(std::env::var("MUAC_DATA_DIR").ok());
    let thresholds = thresholds_from_env_values(
        std::env::var("MUAC_SEVERE_THRESHOLD").ok(),
        std::env::var("MUAC_NORMAL_THRESHOLD").ok(),
        std::env::var("MUAC_MAX_VALUE").ok(),
    )?;
    Ok(CoreConfig::new(data_dir, thresholds))
}

/// Binds `addr` and serves the router until the server stops.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the HTTP server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ MUAC REST listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Maps a core error to a status and logs it.
///
/// Validation errors are 400, missing records 404, uniqueness conflicts 409. Everything else
/// is a 500 whose details stay in the log.
fn map_core_error(context: &'static str, e: CoreError) -> ApiError {
    let status = match &e {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("{} error: {:?}", context, e);
        return (
            status,
            Json(ErrorRes {
                error: "Internal error".into(),
            }),
        );
    }
    tracing::warn!("{} rejected: {}", context, e);
    (
        status,
        Json(ErrorRes {
            error: e.to_string(),
        }),
    )
}

fn parse_path_id(raw: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(raw).map_err(|e| map_core_error("Parse id", e))
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// This endpoint is used for monitoring and load balancer health checks.
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/classify",
    params(ClassifyQuery),
    responses(
        (status = 200, description = "Classification of the value", body = ClassificationRes),
        (status = 400, description = "Value outside the valid range", body = ErrorRes)
    )
)]
/// Classify a value without storing anything
///
/// # Errors
/// Returns `400 Bad Request` if the value is not in `(0, max_value]`.
async fn classify(
    State(state): State<AppState>,
    Query(query): Query<ClassifyQuery>,
) -> Result<Json<ClassificationRes>, ApiError> {
    let thresholds = state.cfg.thresholds();
    if !thresholds.is_valid_value(query.value) {
        return Err(map_core_error(
            "Classify",
            CoreError::InvalidInput(format!(
                "value must be greater than 0 and at most {}",
                thresholds.max_value()
            )),
        ));
    }
    Ok(Json(thresholds.classify(query.value).into()))
}

#[utoipa::path(
    post,
    path = "/measurements",
    request_body = CreateMeasurementReq,
    responses(
        (status = 201, description = "Measurement recorded and classified", body = ClassifiedMeasurementRes),
        (status = 400, description = "Invalid value, id or note", body = ErrorRes),
        (status = 404, description = "Unknown patient or operator", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Record a new measurement
///
/// Classifies the value, attaches a severity label and a recommendation (creating either on
/// first use) and stores the measurement.
///
/// # Errors
/// Returns `400 Bad Request` for invalid input and `404 Not Found` for an unknown patient or
/// operator.
#[axum::debug_handler]
async fn create_measurement(
    State(state): State<AppState>,
    Json(req): Json<CreateMeasurementReq>,
) -> Result<(StatusCode, Json<ClassifiedMeasurementRes>), ApiError> {
    let input = req
        .into_new_measurement()
        .map_err(|e| map_core_error("Create measurement", e))?;
    match state.measurements.create_classified(input) {
        Ok(result) => Ok((StatusCode::CREATED, Json(result.into()))),
        Err(e) => Err(map_core_error("Create measurement", e)),
    }
}

#[utoipa::path(
    get,
    path = "/measurements/{id}",
    params(("id" = String, Path, description = "Measurement id")),
    responses(
        (status = 200, description = "Measurement with its labels", body = ClassifiedMeasurementRes),
        (status = 400, description = "Malformed id", body = ErrorRes),
        (status = 404, description = "Measurement not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_measurement(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ClassifiedMeasurementRes>, ApiError> {
    let id = parse_path_id(&id)?;
    state
        .measurements
        .get_classified(id)
        .map(|result| Json(result.into()))
        .map_err(|e| map_core_error("Get measurement", e))
}

#[utoipa::path(
    post,
    path = "/measurements/{id}/reclassify",
    params(("id" = String, Path, description = "Measurement id")),
    responses(
        (status = 200, description = "Measurement re-pointed at current labels", body = ClassifiedMeasurementRes),
        (status = 400, description = "Malformed id", body = ErrorRes),
        (status = 404, description = "Measurement not found", body = ErrorRes)
    )
)]
/// Reclassify a stored measurement under the current thresholds
#[axum::debug_handler]
async fn reclassify_measurement(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ClassifiedMeasurementRes>, ApiError> {
    let id = parse_path_id(&id)?;
    state
        .measurements
        .reclassify(id)
        .map(|result| Json(result.into()))
        .map_err(|e| map_core_error("Reclassify measurement", e))
}

#[utoipa::path(
    get,
    path = "/reports/dashboard",
    params(ReportQuery),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardRes),
        (status = 400, description = "Malformed filter", body = ErrorRes)
    )
)]
/// Headline counts and the distribution of each patient's latest measurement
async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<DashboardRes>, ApiError> {
    let filters = query.to_filters().map_err(|e| map_core_error("Dashboard", e))?;
    state
        .reports
        .dashboard(&filters)
        .map(|summary| Json(summary.into()))
        .map_err(|e| map_core_error("Dashboard", e))
}

#[utoipa::path(
    get,
    path = "/reports/regions",
    params(ReportQuery),
    responses(
        (status = 200, description = "Distribution per region", body = RegionsRes),
        (status = 400, description = "Malformed filter", body = ErrorRes)
    )
)]
async fn regions(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<RegionsRes>, ApiError> {
    let filters = query.to_filters().map_err(|e| map_core_error("Regions", e))?;
    match state.reports.by_region(&filters) {
        Ok(rows) => Ok(Json(RegionsRes {
            regions: rows.into_iter().map(Into::into).collect(),
        })),
        Err(e) => Err(map_core_error("Regions", e)),
    }
}

#[utoipa::path(
    get,
    path = "/reports/recent",
    params(ReportQuery),
    responses(
        (status = 200, description = "Most recent measurements, newest first", body = RecentRes),
        (status = 400, description = "Malformed filter", body = ErrorRes)
    )
)]
/// Recent measurements feed
///
/// Defaults to the last 7 days and 50 rows.
async fn recent(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<RecentRes>, ApiError> {
    let filters = query.to_filters().map_err(|e| map_core_error("Recent", e))?;
    match state.reports.recent(&filters) {
        Ok(rows) => Ok(Json(RecentRes {
            measurements: rows.into_iter().map(Into::into).collect(),
        })),
        Err(e) => Err(map_core_error("Recent", e)),
    }
}

#[utoipa::path(
    get,
    path = "/reports/at-risk",
    params(ReportQuery),
    responses(
        (status = 200, description = "Patients at risk, split into severe and moderate", body = AtRiskRes),
        (status = 400, description = "Malformed filter", body = ErrorRes)
    )
)]
async fn at_risk(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AtRiskRes>, ApiError> {
    let filters = query.to_filters().map_err(|e| map_core_error("At risk", e))?;
    state
        .reports
        .at_risk(&filters)
        .map(|report| Json(report.into()))
        .map_err(|e| map_core_error("At risk", e))
}

#[utoipa::path(
    get,
    path = "/reports/operators",
    params(ReportQuery),
    responses(
        (status = 200, description = "Activity per operator", body = OperatorsRes),
        (status = 400, description = "Malformed filter", body = ErrorRes)
    )
)]
async fn operators(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<OperatorsRes>, ApiError> {
    let filters = query.to_filters().map_err(|e| map_core_error("Operators", e))?;
    match state.reports.operator_activity(&filters) {
        Ok(rows) => Ok(Json(OperatorsRes {
            operators: rows.into_iter().map(Into::into).collect(),
        })),
        Err(e) => Err(map_core_error("Operators", e)),
    }
}

#[utoipa::path(
    get,
    path = "/locations/nearby",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Locations within the radius, nearest first", body = NearbyRes),
        (status = 400, description = "Invalid origin", body = ErrorRes)
    )
)]
async fn nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<NearbyRes>, ApiError> {
    match state.proximity.nearby(query.lat, query.lng, query.radius_km) {
        Ok(rows) => Ok(Json(NearbyRes {
            locations: rows.into_iter().map(Into::into).collect(),
        })),
        Err(e) => Err(map_core_error("Nearby", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use muac_core::store::MemoryStore;
    use muac_core::{Location, Operator, Patient, Thresholds};
    use serde::de::DeserializeOwned;
    use std::path::PathBuf;
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        patient: RecordId,
        operator: RecordId,
    }

    fn test_app() -> TestApp {
        let memory = Arc::new(MemoryStore::new());
        let patient = RecordId::new();
        let operator = RecordId::new();
        memory
            .insert_patient(Patient {
                id: patient,
                name: "Amina".into(),
                birth_date: None,
                region_id: None,
            })
            .unwrap();
        memory
            .insert_operator(Operator {
                id: operator,
                name: "Wanjiru".into(),
                region_id: None,
            })
            .unwrap();
        memory
            .insert_location(Location {
                id: RecordId::new(),
                name: "Clinic".into(),
                latitude: "-1.30".into(),
                longitude: "36.80".into(),
                description: String::new(),
            })
            .unwrap();

        let cfg = Arc::new(CoreConfig::new(PathBuf::from("unused"), Thresholds::OFFICIAL));
        TestApp {
            app: router(AppState::new(cfg, Stores::memory(memory))),
            patient,
            operator,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn json<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).expect("response should be JSON")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_measurement(t: &TestApp, value: f64) -> Request<Body> {
        let body = serde_json::json!({
            "value": value,
            "note": "left arm",
            "patient_id": t.patient.to_string(),
            "operator_id": t.operator.to_string(),
        });
        Request::builder()
            .method("POST")
            .uri("/measurements")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let t = test_app();
        let (status, body) = send(&t.app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json::<HealthRes>(&body).ok);
    }

    #[tokio::test]
    async fn test_classify_boundaries_and_invalid_value() {
        let t = test_app();

        let (status, body) = send(&t.app, get_request("/classify?value=12.5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json::<ClassificationRes>(&body).code, "GREEN");

        let (_, body) = send(&t.app, get_request("/classify?value=11.5")).await;
        assert_eq!(json::<ClassificationRes>(&body).category, "moderate");

        let (status, _) = send(&t.app, get_request("/classify?value=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_measurement_returns_created_with_labels() {
        let t = test_app();

        let (status, body) = send(&t.app, post_measurement(&t, 9.8)).await;

        assert_eq!(status, StatusCode::CREATED);
        let res: ClassifiedMeasurementRes = json(&body);
        assert_eq!(res.classification.code, "RED");
        assert_eq!(res.severity_label.severity_code.as_deref(), Some("RED"));
        assert_eq!(res.recommendation.priority, "urgent");
        assert!(res.created_labels.severity_label);
        assert_eq!(
            res.measurement.severity_label_id.as_deref(),
            Some(res.severity_label.id.as_str())
        );

        let uri = format!("/measurements/{}", res.measurement.id);
        let (status, body) = send(&t.app, get_request(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let loaded: ClassifiedMeasurementRes = json(&body);
        assert_eq!(loaded.measurement, res.measurement);
        assert!(!loaded.created_labels.severity_label);
    }

    #[tokio::test]
    async fn test_create_measurement_maps_errors_to_statuses() {
        let t = test_app();

        let (status, body) = send(&t.app, post_measurement(&t, 50.01)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json::<ErrorRes>(&body).error.contains("value"));

        let unknown = TestApp {
            app: t.app.clone(),
            patient: RecordId::new(),
            operator: t.operator,
        };
        let (status, _) = send(&t.app, post_measurement(&unknown, 12.0)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&t.app, get_request("/measurements/not-an-id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/measurements/{}", RecordId::new());
        let (status, _) = send(&t.app, get_request(&missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reports_reflect_recorded_measurements() {
        let t = test_app();
        send(&t.app, post_measurement(&t, 11.0)).await;
        send(&t.app, post_measurement(&t, 10.5)).await;

        let (status, body) = send(&t.app, get_request("/reports/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        let dashboard: DashboardRes = json(&body);
        assert_eq!(dashboard.total_measurements, 2);
        assert_eq!(dashboard.distribution.total, 1);
        assert_eq!(dashboard.distribution.severe.count, 1);

        let (_, body) = send(&t.app, get_request("/reports/recent?limit=1")).await;
        assert_eq!(json::<RecentRes>(&body).measurements.len(), 1);

        let (_, body) = send(&t.app, get_request("/reports/at-risk")).await;
        let at_risk: AtRiskRes = json(&body);
        assert_eq!(at_risk.total, 1);
        assert_eq!(at_risk.severe[0].patient_name.as_deref(), Some("Amina"));

        let (_, body) = send(&t.app, get_request("/reports/operators")).await;
        let operators: OperatorsRes = json(&body);
        assert_eq!(operators.operators[0].total_measurements, 2);

        let (status, _) = send(&t.app, get_request("/reports/regions?region_id=bogus")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nearby_locations() {
        let t = test_app();

        let (status, body) =
            send(&t.app, get_request("/locations/nearby?lat=-1.29&lng=36.82")).await;
        assert_eq!(status, StatusCode::OK);
        let res: NearbyRes = json(&body);
        assert_eq!(res.locations.len(), 1);
        assert!(res.locations[0].distance_km < 10.0);

        let (status, _) = send(&t.app, get_request("/locations/nearby?lat=91&lng=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/classify",
            "/measurements",
            "/measurements/{id}",
            "/measurements/{id}/reclassify",
            "/reports/dashboard",
            "/reports/at-risk",
            "/locations/nearby",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
