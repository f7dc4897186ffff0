//! # fl-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the services.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod farm;

use actix_web::{http::header, http::StatusCode, HttpResponse};
use serde::Serialize;

use crate::extract::safe_redirect;

/// Form posts may name a same-site page to return to; API clients get JSON.
pub(crate) fn respond<T: Serialize>(redirect_to: Option<&str>, status: StatusCode, body: &T) -> HttpResponse {
    match safe_redirect(redirect_to) {
        Some(location) => HttpResponse::SeeOther()
            .insert_header((header::LOCATION, location))
            .finish(),
        None => HttpResponse::build(status).json(body),
    }
}
