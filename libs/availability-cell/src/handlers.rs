use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Session;
use shared_models::error::AppError;

use crate::models::{wire_time, NewAvailabilityRule, SlotCheck};
use crate::services::calendar::{BookingCalendar, CalendarMonth, CalendarView};
use crate::services::manager::{AvailabilityManager, BulkForm, ManagerStatus};
use crate::services::{AvailabilityClient, AvailabilityStore, SystemClock, TracingNotifier};

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub confirm: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// `YYYY-MM`; defaults to the current month.
    pub month: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CheckSlotRequest {
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub time: NaiveTime,
}

fn build_store(config: &AppConfig, session: Arc<Session>) -> AvailabilityStore {
    AvailabilityStore::new(AvailabilityClient::new(config, session))
}

fn optional_session(auth: Option<TypedHeader<Authorization<Bearer>>>) -> Arc<Session> {
    match auth {
        Some(TypedHeader(auth)) => Arc::new(Session::with_token(auth.token())),
        None => Arc::new(Session::new()),
    }
}

async fn mounted_manager(
    config: &AppConfig,
    session: Arc<Session>,
    confirm: bool,
) -> Result<AvailabilityManager, AppError> {
    let mut manager = AvailabilityManager::new(
        build_store(config, session),
        Arc::new(TracingNotifier::new(confirm)),
        Arc::new(SystemClock),
    );

    let status = manager.mount().await?.clone();
    if status == ManagerStatus::NoProfile {
        return Err(AppError::NotFound("No practitioner profile found for the current user".to_string()));
    }
    Ok(manager)
}

fn manager_view(manager: &AvailabilityManager) -> Value {
    json!({
        "status": manager.status(),
        "profile": manager.profile(),
        "rules": manager.rules(),
        "loading": manager.is_loading(),
        "error": manager.error(),
    })
}

// ==============================================================================
// PRACTITIONER AVAILABILITY SCREEN (AUTHENTICATED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(session): Extension<Arc<Session>>,
) -> Result<Json<Value>, AppError> {
    let manager = mounted_manager(&state, session, false).await?;
    Ok(Json(manager_view(&manager)))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(session): Extension<Arc<Session>>,
    Json(rule): Json<NewAvailabilityRule>,
) -> Result<Json<Value>, AppError> {
    let mut manager = mounted_manager(&state, session, false).await?;

    manager.open_create();
    manager.form_mut().fill_from(&rule);
    let saved = manager.submit_form().await?;

    Ok(Json(json!({
        "saved": saved,
        "screen": manager_view(&manager),
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(session): Extension<Arc<Session>>,
    Path(rule_id): Path<Uuid>,
    Json(rule): Json<NewAvailabilityRule>,
) -> Result<Json<Value>, AppError> {
    let mut manager = mounted_manager(&state, session, false).await?;

    if !manager.edit(rule_id) {
        return Err(AppError::NotFound(format!("Availability {} not found", rule_id)));
    }
    manager.form_mut().fill_from(&rule);
    let saved = manager.submit_form().await?;

    Ok(Json(json!({
        "saved": saved,
        "screen": manager_view(&manager),
    })))
}

/// Deletion only happens with `?confirm=true`; otherwise the confirmation
/// is treated as declined.
#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(session): Extension<Arc<Session>>,
    Path(rule_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    let mut manager = mounted_manager(&state, session, query.confirm.unwrap_or(false)).await?;

    let deleted = manager.delete(rule_id).await?;

    Ok(Json(json!({
        "deleted": deleted,
        "screen": manager_view(&manager),
    })))
}

#[axum::debug_handler]
pub async fn bulk_create_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(session): Extension<Arc<Session>>,
    Json(form): Json<BulkForm>,
) -> Result<Json<Value>, AppError> {
    let mut manager = mounted_manager(&state, session, false).await?;

    manager.set_bulk_form(form);
    let created = manager.submit_bulk().await?;

    Ok(Json(json!({
        "created": created,
        "screen": manager_view(&manager),
    })))
}

// ==============================================================================
// BOOKING CALENDAR (PUBLIC, TOKEN FORWARDED WHEN PRESENT)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_practitioner_calendar(
    State(state): State<Arc<AppConfig>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarView>, AppError> {
    let store = Arc::new(build_store(&state, optional_session(auth)));
    let mut calendar = BookingCalendar::new(
        store,
        practitioner_id,
        Arc::new(TracingNotifier::new(false)),
        Arc::new(SystemClock),
    );

    match query.month.as_deref() {
        Some(raw) => {
            let month: CalendarMonth = raw.parse().map_err(AppError::BadRequest)?;
            calendar.go_to_month(month).await?;
        }
        None => calendar.load().await?,
    }

    if let Some(date) = query.date {
        calendar.select_date(date);
    }

    Ok(Json(calendar.view()))
}

#[axum::debug_handler]
pub async fn check_practitioner_slot(
    State(state): State<Arc<AppConfig>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(practitioner_id): Path<Uuid>,
    Json(request): Json<CheckSlotRequest>,
) -> Json<SlotCheck> {
    let store = build_store(&state, optional_session(auth));
    Json(
        store
            .check_slot_availability(practitioner_id, request.date, request.time)
            .await,
    )
}
