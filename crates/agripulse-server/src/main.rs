#![forbid(unsafe_code)]

use agripulse_model::PlanPrices;
use agripulse_server::upstream::{
    ChatCompletionsClient, CompletionClient, HttpIdentityProvider, IdentityProvider, NewsProvider,
    OpenWeatherClient, PaymentGateway, PaystackGateway, SerpNewsClient, WeatherProvider,
};
use agripulse_server::{
    build_router, validate_startup_config_contract, ApiConfig, AppState, DocumentStore,
    MemoryStore, SqliteStore, SystemClock,
};
use opentelemetry::trace::TracerProvider as _;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_json = env_bool("AGRIPULSE_LOG_JSON", true);
    if env_bool("AGRIPULSE_OTEL_ENABLED", false) {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .build()
            .expect("otlp exporter");
        let tracer = opentelemetry_sdk::trace::TracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .build()
            .tracer("agripulse-server");
        if log_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        }
    } else if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn config_from_env() -> ApiConfig {
    let defaults = ApiConfig::default();
    let cors = env_list("AGRIPULSE_CORS_ALLOWED_ORIGINS");
    ApiConfig {
        bind_addr: env::var("AGRIPULSE_BIND").unwrap_or(defaults.bind_addr),
        max_body_bytes: env_usize("AGRIPULSE_MAX_BODY_BYTES", defaults.max_body_bytes),
        admin_secret: env::var("AGRIPULSE_ADMIN_SECRET").ok(),
        access_code: env::var("AGRIPULSE_ACCESS_CODE").unwrap_or(defaults.access_code),
        access_code_max_uses: env_u64(
            "AGRIPULSE_ACCESS_CODE_MAX_USES",
            defaults.access_code_max_uses,
        ),
        paystack_public_key: env::var("AGRIPULSE_PAYSTACK_PUBLIC_KEY").ok(),
        prices: PlanPrices {
            monthly_major: env_u64("AGRIPULSE_PRICE_MONTHLY", defaults.prices.monthly_major),
            yearly_major: env_u64("AGRIPULSE_PRICE_YEARLY", defaults.prices.yearly_major),
        },
        public_app_url: env::var("AGRIPULSE_PUBLIC_APP_URL").unwrap_or(defaults.public_app_url),
        cors_allowed_origins: if cors.is_empty() {
            defaults.cors_allowed_origins
        } else {
            cors
        },
        shutdown_drain: Duration::from_millis(env_u64("AGRIPULSE_SHUTDOWN_DRAIN_MS", 5000)),
    }
}

fn open_store() -> Result<Arc<dyn DocumentStore>, String> {
    if env::var("AGRIPULSE_STORE").as_deref() == Ok("memory") {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = PathBuf::from(
        env::var("AGRIPULSE_SQLITE_PATH")
            .unwrap_or_else(|_| "artifacts/agripulse.sqlite3".to_string()),
    );
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("store dir failed: {e}"))?;
    }
    let store = SqliteStore::open(&path).map_err(|e| format!("store open failed: {e}"))?;
    Ok(Arc::new(store))
}

fn required_key(name: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            warn!("{name} is not set; calls through this provider will fail");
            String::new()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let config = config_from_env();
    validate_startup_config_contract(&config)?;

    let store = open_store()?;
    let http = reqwest::Client::new();

    let gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackGateway::new(
        http.clone(),
        env::var("AGRIPULSE_PAYSTACK_BASE_URL")
            .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
        required_key("AGRIPULSE_PAYSTACK_SECRET_KEY"),
    ));
    let identity: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(
        http.clone(),
        env::var("AGRIPULSE_IDENTITY_BASE_URL")
            .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com/v1".to_string()),
        required_key("AGRIPULSE_IDENTITY_SERVER_KEY"),
    ));
    let weather: Arc<dyn WeatherProvider> = Arc::new(OpenWeatherClient::new(
        http.clone(),
        env::var("AGRIPULSE_WEATHER_BASE_URL")
            .unwrap_or_else(|_| "https://api.openweathermap.org".to_string()),
        required_key("AGRIPULSE_WEATHER_API_KEY"),
    ));
    let completion: Arc<dyn CompletionClient> = Arc::new(ChatCompletionsClient::new(
        http.clone(),
        env::var("AGRIPULSE_COMPLETION_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        required_key("AGRIPULSE_COMPLETION_API_KEY"),
        env::var("AGRIPULSE_COMPLETION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
    ));
    let news: Option<Arc<dyn NewsProvider>> = env::var("AGRIPULSE_NEWS_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(|key| {
            Arc::new(SerpNewsClient::new(
                http.clone(),
                env::var("AGRIPULSE_NEWS_BASE_URL")
                    .unwrap_or_else(|_| "https://serpapi.com".to_string()),
                key,
            )) as Arc<dyn NewsProvider>
        });

    let bind_addr = config.bind_addr.clone();
    let drain = config.shutdown_drain;
    let state = AppState::new(
        config,
        store,
        identity,
        gateway,
        weather,
        completion,
        news,
        Arc::new(SystemClock),
    );

    if let Err(err) = state.access_codes.seed().await {
        error!("access code seeding failed: {err}");
    }

    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket
        .set_keepalive(env_bool("AGRIPULSE_TCP_KEEPALIVE_ENABLED", true))
        .map_err(|e| format!("set_keepalive failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("agripulse-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            // Drain in-flight requests before the process exits.
            tokio::time::sleep(drain).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
