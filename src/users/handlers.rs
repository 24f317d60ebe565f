use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::dto::MessageResponse,
    auth::handlers::is_valid_email,
    auth::jwt::AuthUser,
    error::{internal, ApiError},
    state::AppState,
    users::{
        dto::{AddDependentRequest, AddDependentResponse, PublicUser, UpdateProfileRequest, UserView},
        repo::is_unique_violation,
        repo_types::User,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/add-dependent", post(add_dependent))
        .route("/users/dependents", get(list_dependents))
        .route(
            "/users/dependents/:dependent_id",
            axum::routing::delete(remove_dependent),
        )
}

/// Resolve the bearer subject to a live user record.
async fn current_user(state: &AppState, email: &str) -> Result<User, ApiError> {
    User::find_by_email(&state.db, email)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = User::list_all(&state.db).await.map_err(internal)?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

#[instrument(skip(state, email))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<UserView>, ApiError> {
    let user = current_user(&state, &email).await?;
    Ok(Json(UserView::from(user)))
}

#[instrument(skip(state, email, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserView>, ApiError> {
    let user = current_user(&state, &email).await?;

    if let Some(new_email) = payload.email.as_deref() {
        if !is_valid_email(new_email) {
            return Err(ApiError::BadRequest("Invalid email".into()));
        }
    }

    let updated = match User::update_profile(
        &state.db,
        user.id,
        payload.email.as_deref(),
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await
    {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => return Err(ApiError::EmailTaken),
        Err(e) => return Err(internal(e)),
    };

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(UserView::from(updated)))
}

#[instrument(skip(state, email, payload))]
pub async fn add_dependent(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    Json(payload): Json<AddDependentRequest>,
) -> Result<Json<AddDependentResponse>, ApiError> {
    let caregiver = current_user(&state, &email).await?;

    let dependent = User::find_by_email(&state.db, &payload.dependent_email)
        .await
        .map_err(internal)?
        .ok_or(ApiError::UserNotFound)?;

    // A user can never be its own caregiver
    if dependent.id == caregiver.id {
        warn!(user_id = %caregiver.id, "self-caregiver link rejected");
        return Err(ApiError::BadRequest(
            "Users cannot be their own caregiver".into(),
        ));
    }

    if dependent.caregiver_id.is_some() {
        return Err(ApiError::BadRequest("User already has a caregiver".into()));
    }

    User::set_caregiver(&state.db, dependent.id, caregiver.id)
        .await
        .map_err(internal)?;

    info!(caregiver_id = %caregiver.id, dependent_id = %dependent.id, "dependent linked");
    Ok(Json(AddDependentResponse {
        message: "Dependent added successfully".into(),
        dependent_email: payload.dependent_email,
    }))
}

#[instrument(skip(state, email))]
pub async fn list_dependents(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let caregiver = current_user(&state, &email).await?;
    let dependents = User::list_dependents(&state.db, caregiver.id)
        .await
        .map_err(internal)?;
    Ok(Json(dependents.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, email))]
pub async fn remove_dependent(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    Path(dependent_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caregiver = current_user(&state, &email).await?;

    let removed = User::clear_caregiver(&state.db, dependent_id, caregiver.id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(ApiError::NotFound("Dependent not found".into()));
    }

    info!(caregiver_id = %caregiver.id, dependent_id = %dependent_id, "dependent unlinked");
    Ok(Json(MessageResponse {
        message: "Dependent removed successfully".into(),
    }))
}
