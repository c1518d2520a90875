use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use coverage_analysis::{
    AnalysisConfig, AnalysisError, AnalysisResult, NarrativeGenerator, Orchestrator, PolicyInput,
    RigNarrativeGenerator, RuleCatalog, StaticRiskDataSource, UnavailableNarrativeGenerator,
};
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coverage_gap_service=debug,coverage_analysis=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).unwrap(),
    );

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    // The narrative collaborator is optional: without an API key every gap
    // explanation goes through the deterministic fallback templates.
    let generator: Arc<dyn NarrativeGenerator> = match RigNarrativeGenerator::from_env() {
        Ok(generator) => {
            info!("Using OpenRouter narrative generator");
            Arc::new(generator)
        }
        Err(e) => {
            warn!(
                "OPENROUTER_API_KEY not available ({}), gap explanations will use fallback templates",
                e
            );
            Arc::new(UnavailableNarrativeGenerator)
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(RuleCatalog::builtin()),
        Arc::new(StaticRiskDataSource::builtin()),
        generator,
        AnalysisConfig::default(),
    ));

    let app_state = AppState { orchestrator };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/analyze", post(analyze_policy))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("Server running on http://{addr}");

    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

async fn analyze_policy(
    State(state): State<AppState>,
    Json(input): Json<PolicyInput>,
) -> Result<Json<AnalysisResult>, (StatusCode, String)> {
    info!(
        policy_number = %input.policy_number,
        coverages = input.existing_coverages.len(),
        "Processing analysis request"
    );

    match state.orchestrator.analyze(input).await {
        Ok(result) => {
            info!(
                policy_number = %result.policy_number,
                gaps = result.total_gaps_found,
                "Analysis completed"
            );
            Ok(Json(result))
        }
        Err(e @ AnalysisError::InvalidInput(_)) => {
            error!(error = %e, "Invalid policy input");
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            error!(error = %e, "Analysis failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
