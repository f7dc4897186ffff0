//! # fl-api
//!
//! The web routing and orchestration layer for Farmlog. Handlers decode the
//! request, check the session and CSRF token, and hand off to fl-services.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod multipart;

use std::sync::Arc;

use actix_web::web;
use fl_core::{AppError, AuthProvider};
use fl_services::Services;

pub use error::ApiError;

/// Default ceiling for a single multipart request.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub services: Services,
    pub auth: Arc<dyn AuthProvider>,
    /// Sets the `Secure` flag on every cookie; off only for local http.
    pub secure_cookies: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(services: Services, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            services,
            auth,
            secure_cookies: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Configures the routes for the API.
///
/// # Developer Note
/// Everything sits under `/api`; the binary decides what else to mount.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::FormConfig::default().error_handler(|err, _| {
        ApiError(AppError::invalid(err.to_string())).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        ApiError(AppError::invalid(err.to_string())).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _| {
        ApiError(AppError::invalid(err.to_string())).into()
    }))
    .service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(handlers::auth::register))
                    .route("/captcha", web::get().to(handlers::auth::captcha))
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/logout", web::post().to(handlers::auth::logout)),
            )
            .service(
                web::scope("/admin")
                    .route("/approve-user", web::post().to(handlers::admin::approve_user))
                    .route("/role", web::post().to(handlers::admin::change_role)),
            )
            .route("/farm", web::get().to(handlers::farm::list_records))
            .route("/farm", web::post().to(handlers::farm::create_record))
            .route("/farm/{id}", web::get().to(handlers::farm::get_record))
            .route("/upload", web::post().to(handlers::farm::upload_file))
            .route("/download/{id}", web::get().to(handlers::farm::download_file))
            .service(
                web::scope("/comments")
                    .route("", web::get().to(handlers::comments::list))
                    .route("", web::post().to(handlers::comments::create))
                    .route("/update", web::post().to(handlers::comments::update))
                    .route("/delete", web::post().to(handlers::comments::delete))
                    .route("/attachment/{id}", web::get().to(handlers::comments::attachment))
                    .route("/landing", web::get().to(handlers::comments::landing)),
            ),
    );
}
