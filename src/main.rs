mod adapter;
mod classifier;
mod completion;
mod config;
mod types;
mod worker;

use axum::{
    Router,
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use metrics::counter;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use adapter::{Classifier, CompletionBackend};
use classifier::{ClassifierConfig, SentimentClassifier};
use completion::CompletionClient;
use config::Config;
use types::{AnalyzeResponse, ApiError, SentimentRequest};
use worker::ClassifierHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sentiment_router=debug".into()),
        )
        .init();

    let config = Config::parse();
    tracing::info!(
        model_path = ?config.model_path,
        model_id = ?config.model_id,
        api_url = %config.api_url,
        "Starting sentiment router"
    );

    if config.model_id.is_none() && config.model_path.is_none() {
        anyhow::bail!("Either --model-id or --model-path must be provided");
    }
    let Some(api_key) = config.api_key.clone() else {
        anyhow::bail!("API key is missing. Use 'export GROQ_API_KEY=your_api_key'");
    };

    let classifier_config = ClassifierConfig {
        model_id: config.model_id.clone(),
        model_path: config.model_path.clone(),
        revision: config.model_revision.clone(),
        use_pth: config.use_pth,
        cpu: config.cpu_only,
        max_sequence_length: config.max_sequence_length,
    };

    tracing::info!("Loading sentiment model...");
    let classifier = SentimentClassifier::load(classifier_config).await?;
    tracing::info!("Model loaded successfully");

    let classifier = ClassifierHandle::spawn(classifier);

    let completion = CompletionClient::new(
        config.api_url.clone(),
        api_key,
        config.remote_model.clone(),
        config.max_completion_tokens,
        config.upstream_timeout(),
    )?;

    let cors = CorsLayer::new()
        .allow_origin(config.allowed_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = Router::new()
        .route("/analyze/", post(analyze_handler))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState::new(Arc::new(classifier), Arc::new(completion)));

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    classifier: Arc<dyn Classifier>,
    completion: Arc<dyn CompletionBackend>,
}

impl AppState {
    fn new(classifier: Arc<dyn Classifier>, completion: Arc<dyn CompletionBackend>) -> Self {
        Self {
            classifier,
            completion,
        }
    }
}

#[tracing::instrument(skip(state, request), fields(model = %request.model, text_len = request.text.len()))]
async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<SentimentRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    counter!("analyze_requests_total").increment(1);
    tracing::info!("Processing analyze request");

    match request.model.as_str() {
        "custom" => {
            let result = state.classifier.classify(&request.text).await?;
            Ok(Json(AnalyzeResponse::Classification(result)))
        }
        "llama" => {
            let text = state.completion.complete(&request.text).await?;
            Ok(Json(AnalyzeResponse::Completion(text)))
        }
        other => Err(ApiError::InvalidModel(other.to_string())),
    }
}
