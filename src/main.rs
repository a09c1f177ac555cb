use axum::{
    body::Body,
    http::{header, header::HeaderMap, HeaderValue, Request},
    middleware::{from_fn, Next},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use donorhub::progress::ProgressTracker;
use donorhub::{auth, db, routes, AppState};
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "donorhub=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting donorhub...");

    tracing::info!("Initializing database connection pool...");
    let db_pool = db::init_pool().await?;
    tracing::info!("Database connection pool initialized successfully");

    seed_admin_user(&db_pool).await?;

    let progress = ProgressTracker::new();
    progress.spawn_sweeper();

    let state = AppState {
        db: db_pool,
        progress,
    };

    let cors = {
        let origins: Vec<HeaderValue> = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|s| {
                        let trimmed = s.trim();
                        if trimmed.is_empty() {
                            return None;
                        }
                        match trimmed.parse::<HeaderValue>() {
                            Ok(value) => Some(value),
                            Err(_) => {
                                tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", trimmed);
                                None
                            }
                        }
                    })
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    HeaderValue::from_static("http://localhost:3000"),
                    HeaderValue::from_static("http://127.0.0.1:3000"),
                ]
            });

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(true)
    };

    let app = Router::new()
        .route("/health", get(health_check))
        // Donors
        .route(
            "/api/donors",
            get(routes::donors::list_donors).post(routes::donors::create_donor),
        )
        .route(
            "/api/donors/{id}",
            get(routes::donors::get_donor)
                .put(routes::donors::update_donor)
                .delete(routes::donors::delete_donor),
        )
        .route("/api/donors/import", post(routes::donors::import_donors))
        // Events and their donor lists
        .route(
            "/api/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/api/events/{id}",
            get(routes::events::get_event)
                .put(routes::events::update_event)
                .delete(routes::events::delete_event),
        )
        .route(
            "/api/events/{id}/donors",
            get(routes::events::list_event_donors).post(routes::events::add_event_donors),
        )
        .route(
            "/api/events/{id}/donors/{donor_id}",
            axum::routing::delete(routes::events::remove_event_donor),
        )
        .route(
            "/api/events/{id}/donors/{donor_id}/status",
            put(routes::events::set_event_donor_status),
        )
        .route("/api/events/{id}/list/recompute", post(routes::events::recompute_list))
        .route(
            "/api/events/{id}/list/review-status",
            put(routes::events::override_review_status),
        )
        // Operation progress polling
        .route("/api/operations/{id}", get(routes::operations::get_operation))
        .route(
            "/api/operations/{id}/cancel",
            post(routes::operations::cancel_operation),
        )
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        .layer(from_fn(require_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Seeds or refreshes the bootstrap admin account from the environment so a
/// fresh database has at least one login.
async fn seed_admin_user(pool: &db::DbPool) -> anyhow::Result<()> {
    let (Ok(username), Ok(password)) = (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD"))
    else {
        tracing::warn!("ADMIN_USERNAME/ADMIN_PASSWORD not set; no admin account seeded");
        return Ok(());
    };
    db::ensure_user(pool, &username, &auth::hash_password(&password), "Administrator", "pmm").await?;
    tracing::info!("Admin account '{}' ready", username);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

async fn health_check() -> &'static str {
    "OK"
}

async fn require_auth(req: Request<Body>, next: Next) -> impl IntoResponse {
    // Guard only API endpoints; /auth and /health stay open.
    let path = req.uri().path();
    if req.method() == axum::http::Method::OPTIONS || !path.starts_with("/api/") {
        return next.run(req).await;
    }

    let headers: &HeaderMap = req.headers();
    if let Some(token) = auth::extract_token_from_headers(headers) {
        if auth::token_is_valid(&token) {
            return next.run(req).await;
        }
    }

    (axum::http::StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
