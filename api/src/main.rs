use axum::http::{HeaderValue, Method, header};
use dotenv::dotenv;
use eyre::WrapErr;
use mimalloc::MiMalloc;
use threads_api::{
    App,
    config::{Env, ServerConfig},
    db, router,
    thread::{author::AUTHOR_HEADER, store::PgThreadStore},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing(env: &Env) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("threads_api=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Env::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        Env::Dev | Env::Staging => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn cors(config: &ServerConfig) -> eyre::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(AUTHOR_HEADER)]);

    Ok(match &config.cors_allowed_origin {
        Some(origin) => layer.allow_origin(
            origin
                .parse::<HeaderValue>()
                .wrap_err("CORS_ALLOWED_ORIGIN is not a valid header value")?,
        ),
        None => layer,
    })
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    // Before the config, so a missing variable is reported
    init_tracing(&Env::from_env());

    let config = ServerConfig::new_from_env();

    let pool = db::build_pool(&config).wrap_err("couldn't build the database pool")?;
    let store = PgThreadStore::new(pool);

    let listen_addr = config.listen_addr;
    let cors = cors(&config)?;
    let app = router(App::new(store))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .wrap_err_with(|| format!("couldn't bind to {listen_addr}"))?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
