use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use emodiary_engine::pipeline::null_as_empty;
use emodiary_engine::{
    DiaryRequest, DiaryResponse, EmotionResult, ErrorPayload, InferenceContext, Persona,
    PipelineError, Settings,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Diary emotion analysis server
#[derive(Parser, Debug)]
#[command(name = "emodiary-server")]
#[command(about = "Diary emotion analysis and feedback server", long_about = None)]
struct Args {
    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug mode (exposes /api/tokenize endpoint)
    #[arg(long)]
    debug: bool,

    /// Port to listen on (overrides [server].port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides [server].host)
    #[arg(long)]
    host: Option<String>,

    /// Settings file (defaults to ~/.config/emodiary/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory relative weight search paths resolve against
    #[arg(long, default_value = ".")]
    model_dir: PathBuf,
}

#[derive(Clone)]
struct AppState {
    ctx: Arc<InferenceContext>,
    /// Debug mode enabled (--debug flag)
    debug_mode: bool,
}

/// Error response: status code plus `{error, detail}` body
struct ApiError(StatusCode, ErrorPayload);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::EmptyContent => StatusCode::BAD_REQUEST,
            PipelineError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Classification failed: {:?}", err);
        }
        ApiError(status, err.payload())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

fn processing_failed(detail: impl ToString) -> ApiError {
    ApiError(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorPayload {
            error: "processing failed".to_string(),
            detail: detail.to_string(),
        },
    )
}

/// Malformed bodies answer with the same `{error, detail}` shape as pipeline errors.
fn invalid_body(rejection: JsonRejection) -> ApiError {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    ApiError(
        StatusCode::BAD_REQUEST,
        ErrorPayload {
            error: "invalid request body".to_string(),
            detail: rejection.body_text(),
        },
    )
}

#[derive(Debug, Deserialize)]
struct EmotionRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    content: String,
}

#[derive(Debug, Serialize)]
struct PersonaInfo {
    id: &'static str,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct PersonasResponse {
    personas: Vec<PersonaInfo>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    // Default: info level, with --verbose: debug level
    let default_filter = if args.verbose {
        "emodiary_server=debug,emodiary_engine=debug,tower_http=debug"
    } else {
        "emodiary_server=info,emodiary_engine=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    tracing::info!("Loading emotion classifier '{}'...", settings.model.family);
    let ctx = tokio::task::spawn_blocking({
        let settings = settings.clone();
        let model_dir = args.model_dir.clone();
        move || InferenceContext::from_settings(&settings, &model_dir)
    })
    .await??;
    if let Some(reason) = ctx.unavailable_reason() {
        tracing::warn!("Serving without emotion classifier: {}", reason);
    }

    if args.debug {
        tracing::info!("Debug mode enabled - tokenization API available at /api/tokenize");
    }

    let state = AppState {
        ctx: Arc::new(ctx),
        debug_mode: args.debug,
    };
    let app = build_router(state, settings.server.body_limit_bytes);

    // Start server
    let host = args.host.unwrap_or(settings.server.host);
    let port = args.port.unwrap_or(settings.server.port);
    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState, body_limit: usize) -> Router {
    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/ai/diary", post(diary_handler))
        .route("/api/emotion", post(emotion_handler))
        .route("/api/personas", get(personas_handler))
        .route("/health", get(health_handler));

    // Add debug-only routes
    if state.debug_mode {
        app = app.route("/api/tokenize", post(tokenize_handler));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Classify on the blocking pool; the forward pass is CPU-bound.
async fn classify_blocking(state: &AppState, content: &str) -> Result<EmotionResult, ApiError> {
    let ctx = state.ctx.clone();
    let content = content.to_string();
    tokio::task::spawn_blocking(move || ctx.classify(&content))
        .await
        .map_err(|e| {
            tracing::error!("Classification task failed: {}", e);
            processing_failed(e)
        })?
        .map_err(ApiError::from)
}

async fn diary_handler(
    State(state): State<AppState>,
    payload: Result<Json<DiaryRequest>, JsonRejection>,
) -> Result<Json<DiaryResponse>, ApiError> {
    let Json(req) = payload.map_err(invalid_body)?;
    let result = classify_blocking(&state, &req.content).await?;
    tracing::info!(
        "Diary classified as {} ({:.1}%), persona={}",
        result.emotion,
        result.confidence,
        req.persona
    );
    let response = state.ctx.enrich(&req, result.emotion).await;
    Ok(Json(response))
}

async fn emotion_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmotionRequest>, JsonRejection>,
) -> Result<Json<EmotionResult>, ApiError> {
    let Json(req) = payload.map_err(invalid_body)?;
    let result = classify_blocking(&state, &req.content).await?;
    Ok(Json(result))
}

async fn personas_handler() -> impl IntoResponse {
    let personas = Persona::ALL
        .iter()
        .map(|p| PersonaInfo {
            id: p.id(),
            label: p.display_label(),
        })
        .collect();
    Json(PersonasResponse { personas })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "emodiary-engine",
        "model_loaded": state.ctx.is_ready(),
        "model": state.ctx.model_name(),
        "detail": state.ctx.unavailable_reason(),
    }))
}

/// Tokenize request (debug mode only)
#[derive(Debug, Deserialize)]
struct TokenizeRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct TokenInfo {
    id: u32,
    text: String,
    segment: u32,
}

/// Tokenize response
#[derive(Debug, Serialize)]
struct TokenizeResponse {
    tokens: Vec<TokenInfo>,
    valid_length: usize,
    max_seq_length: usize,
}

/// Handle tokenization request (debug mode only)
async fn tokenize_handler(
    State(state): State<AppState>,
    Json(req): Json<TokenizeRequest>,
) -> Result<Json<TokenizeResponse>, (StatusCode, String)> {
    if !state.debug_mode {
        return Err((
            StatusCode::FORBIDDEN,
            "Tokenize API is only available in debug mode".to_string(),
        ));
    }

    let vocab = state.ctx.vocab().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Vocabulary not loaded".to_string(),
        )
    })?;
    let transform = state.ctx.transform();

    let encoded = transform
        .encode(vocab, Some(req.text.as_str()), None)
        .map_err(|e| {
            tracing::error!("Tokenize error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Tokenize error".to_string(),
            )
        })?;

    // Only the non-padding prefix is interesting
    let tokens = encoded.token_ids[..encoded.valid_length]
        .iter()
        .zip(&encoded.segment_ids)
        .map(|(&id, &segment)| TokenInfo {
            id,
            text: vocab.id_to_token(id).unwrap_or_else(|| "<??>".to_string()),
            segment,
        })
        .collect();

    Ok(Json(TokenizeResponse {
        tokens,
        valid_length: encoded.valid_length,
        max_seq_length: transform.max_seq_length(),
    }))
}
