//! # Farmlog Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod settings;

use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::from_fn;
use actix_web::{web, App, HttpServer};
use fl_api::middleware::{cors_policy, issue_csrf_cookie, security_headers, standard_middleware};
use fl_api::{configure_routes, AppState};
use fl_services::Services;
use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[cfg(not(all(feature = "db-sqlite", feature = "storage-local", feature = "auth-simple")))]
compile_error!("farmlog needs the db-sqlite, storage-local and auth-simple features");

// Feature-gated imports
#[cfg(feature = "db-sqlite")]
use fl_db_sqlite::SqliteFarmRepo;

#[cfg(feature = "storage-local")]
use fl_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use fl_auth_simple::SimpleAuthProvider;

const DEFAULT_LOG_FILTER: &str = "farmlog=info,fl_services=info,fl_api=info,actix_web=info";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::load()?;
    init_tracing(settings.log.json);

    // 1. Initialize Database Implementation
    let repo = Arc::new(SqliteFarmRepo::new(&settings.database.url).await?);

    // 2. Initialize Storage Implementation
    let media = Arc::new(LocalMediaStore::new(&settings.media.root));

    // 3. Initialize Auth Implementation
    let auth = Arc::new(
        SimpleAuthProvider::new(settings.auth.session_secret.expose_secret().as_bytes())?
            .with_session_ttl(Duration::from_secs(settings.auth.session_ttl_hours * 3600)),
    );

    // 4. Wire the services and share them with every worker
    let services = Services::new(repo, media, auth.clone());
    let mut state = AppState::new(services, auth);
    state.secure_cookies = settings.auth.secure_cookies;
    state.max_upload_bytes = settings.media.max_upload_bytes;
    let state = web::Data::new(state);

    let (host, port) = (settings.server.host.clone(), settings.server.port);
    info!(%host, port, database = %settings.database.url, "farmlog starting");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(from_fn(issue_csrf_cookie))
            .wrap(security_headers())
            .wrap(cors_policy())
            .wrap(standard_middleware())
            .configure(configure_routes)
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
