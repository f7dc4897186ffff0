//! Farm records and document uploads.

use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use fl_core::AppError;
use fl_services::NewFarmRecord;
use serde::Deserialize;
use uuid::Uuid;

use super::respond;
use crate::error::ApiError;
use crate::extract::{verify_csrf, CurrentActor};
use crate::multipart::read_form;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmForm {
    pub record_date: Option<String>,
    pub total_chickens: i64,
    pub eggs_today: i64,
    pub feed_cost: i64,
    pub medicine_cost: i64,
    pub notes: Option<String>,
    pub csrf: Option<String>,
    pub redirect_to: Option<String>,
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (taken as midnight UTC).
fn parse_record_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| Some(d.and_utc()))
        .ok_or_else(|| AppError::invalid(format!("invalid recordDate {raw:?}")))
}

pub async fn create_record(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    form: web::Form<FarmForm>,
) -> Result<HttpResponse, ApiError> {
    verify_csrf(&req, &data, form.csrf.as_deref())?;
    let form = form.into_inner();
    let input = NewFarmRecord {
        record_date: parse_record_date(form.record_date.as_deref())?,
        total_chickens: form.total_chickens,
        eggs_today: form.eggs_today,
        feed_cost: form.feed_cost,
        medicine_cost: form.medicine_cost,
        notes: form.notes,
    };
    let record = data.services.farm.record(&actor, input).await?;
    Ok(respond(form.redirect_to.as_deref(), StatusCode::CREATED, &record))
}

pub async fn list_records(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<HttpResponse, ApiError> {
    let records = data.services.farm.list_own(&actor).await?;
    Ok(HttpResponse::Ok().json(records))
}

pub async fn get_record(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let record = data.services.farm.get(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// `multipart/form-data` with a `file` part and a `csrf` field.
pub async fn upload_file(
    data: web::Data<AppState>,
    req: HttpRequest,
    CurrentActor(actor): CurrentActor,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_form(payload, "file", data.max_upload_bytes).await?;
    verify_csrf(&req, &data, form.text("csrf"))?;

    let file = form
        .file
        .as_ref()
        .ok_or_else(|| AppError::invalid("file required"))?;
    let filename = file.filename.as_deref().unwrap_or("upload");
    let content_type = file.content_type.as_deref().unwrap_or("application/octet-stream");

    let stored = data
        .services
        .files
        .upload(&actor, filename, content_type, file.data.clone())
        .await?;
    Ok(respond(form.text("redirectTo"), StatusCode::CREATED, &stored))
}

pub async fn download_file(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let (file, bytes) = data.services.files.download(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type(file.mime.as_str())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file.filename.clone())],
        })
        .body(bytes))
}
