use crate::api_state::ApiContext;
use crate::routes::multipart::{field_name, read_file};
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use common_services::api::guests::error::GuestError;
use common_services::api::guests::interfaces::{
    BulkUpsertRequest, BulkUpsertResponse, RegisterRequest, RegistrationResponse,
    UpsertGuestRequest,
};
use common_services::api::guests::service::{
    delete_guest, list_guests, register_guest, upsert_guest, upsert_guests_bulk,
};
use common_services::database::person::Person;
use tracing::instrument;

/// List every known person, named ones first.
///
/// # Errors
///
/// Returns a `GuestError` if the database query fails.
#[utoipa::path(
    get,
    path = "/guests",
    tag = "Guests",
    responses(
        (status = 200, description = "All persons.", body = Vec<Person>),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn list_guests_handler(
    State(context): State<ApiContext>,
) -> Result<Json<Vec<Person>>, GuestError> {
    Ok(Json(list_guests(context.store()).await?))
}

/// Add a guest to the roster, or update the one with the same phone number.
///
/// # Errors
///
/// Returns a `GuestError` if the name is empty, the phone number is invalid or the
/// database fails.
#[utoipa::path(
    post,
    path = "/upsert-guest",
    tag = "Guests",
    request_body = UpsertGuestRequest,
    responses(
        (status = 200, description = "The stored guest.", body = Person),
        (status = 400, description = "Empty name or invalid phone number."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn upsert_guest_handler(
    State(context): State<ApiContext>,
    Json(payload): Json<UpsertGuestRequest>,
) -> Result<Json<Person>, GuestError> {
    Ok(Json(upsert_guest(context.store(), &payload).await?))
}

/// Upsert a whole roster. Invalid entries are reported back, the rest are stored.
///
/// # Errors
///
/// Returns a `GuestError` if the database fails.
#[utoipa::path(
    post,
    path = "/upsert-guests-bulk",
    tag = "Guests",
    request_body = BulkUpsertRequest,
    responses(
        (status = 200, description = "Stored and rejected entries.", body = BulkUpsertResponse),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context, payload), err(Debug))]
pub async fn upsert_guests_bulk_handler(
    State(context): State<ApiContext>,
    Json(payload): Json<BulkUpsertRequest>,
) -> Result<Json<BulkUpsertResponse>, GuestError> {
    Ok(Json(
        upsert_guests_bulk(context.store(), &payload.guests).await?,
    ))
}

/// Remove a person. Their faces stay in the photos, unlabeled.
///
/// # Errors
///
/// Returns a `GuestError` if the person does not exist or the database fails.
#[utoipa::path(
    delete,
    path = "/guest/{person_id}",
    tag = "Guests",
    params(
        ("person_id" = i64, Path, description = "Person id")
    ),
    responses(
        (status = 204, description = "Person deleted."),
        (status = 404, description = "Person not found."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn delete_guest_handler(
    State(context): State<ApiContext>,
    Path(person_id): Path<i64>,
) -> Result<StatusCode, GuestError> {
    delete_guest(context.store(), person_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register as a guest with one or more reference snapshots.
///
/// Earlier event photos the guest appears in are linked right away and sent to them.
///
/// # Errors
///
/// Returns a `GuestError` if a field is invalid, no snapshot contains a usable face,
/// or storage or the database fails.
#[utoipa::path(
    post,
    path = "/register",
    tag = "Guests",
    request_body(content_type = "multipart/form-data", description = "`name`, `phone`, optional `seat` and one or more `photos` files"),
    responses(
        (status = 200, description = "The registered guest.", body = RegistrationResponse),
        (status = 400, description = "Invalid fields or no usable face in any snapshot."),
        (status = 503, description = "Storage is unavailable."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context, multipart), err(Debug))]
pub async fn register_handler(
    State(context): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<RegistrationResponse>, GuestError> {
    let mut request = RegisterRequest {
        name: String::new(),
        phone: String::new(),
        seat: None,
        snapshots: Vec::new(),
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GuestError::Multipart(e.body_text()))?
    {
        let name = field_name(&field);
        let multipart_error = |e: axum::extract::multipart::MultipartError| {
            GuestError::Multipart(e.body_text())
        };
        match name.as_str() {
            "name" => request.name = field.text().await.map_err(multipart_error)?,
            "phone" => request.phone = field.text().await.map_err(multipart_error)?,
            "seat" | "seatNumber" => {
                request.seat = Some(field.text().await.map_err(multipart_error)?);
            }
            "photos" | "photo" | "snapshot" => request
                .snapshots
                .push(read_file(field).await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let pipeline = context.pipeline.clone();
    let response = tokio::spawn(async move { register_guest(&pipeline, request).await }).await??;
    Ok(Json(response))
}
