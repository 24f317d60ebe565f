use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PasswordResetConfirm,
            PasswordResetRequest, RegisterRequest,
        },
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        reset::generate_reset_token,
    },
    error::{internal, ApiError},
    mailer::{reset_email_body, RESET_EMAIL_SUBJECT},
    state::AppState,
    users::{
        dto::{PublicUser, UserView},
        repo::is_unique_violation,
        repo_types::User,
    },
};

/// Acknowledgement returned for every reset request, whether or not the
/// email resolves to an account.
const RESET_REQUEST_ACK: &str = "If the email exists, reset instructions have been sent";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset/request", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<UserView>, ApiError> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    if User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::EmailTaken);
    }

    let hash = hash_password(&payload.password).map_err(internal)?;

    // The unique index on email settles concurrent registrations: the loser
    // of the race sees a unique violation here.
    let user = match User::create(
        &state.db,
        &payload.email,
        &hash,
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await
    {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "registration lost creation race");
            return Err(ApiError::EmailTaken);
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(internal(e));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(UserView::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_string();

    // Unknown email and wrong password must be indistinguishable
    let user = match User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
    {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(internal)?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(&user.email).map_err(internal)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".into(),
        user: PublicUser::from(user),
    }))
}

/// Stateless acknowledgement; bearer tokens cannot be revoked server-side.
#[instrument]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Successfully logged out".into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Some(user) = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
    {
        let token = generate_reset_token();
        state
            .reset_tokens
            .insert(token.clone(), user.email.clone());

        let dependent_count = User::count_dependents(&state.db, user.id)
            .await
            .map_err(internal)?;
        let reset_link = format!(
            "{}/login?reset_token={}",
            state.config.frontend_base_url, token
        );
        let body = reset_email_body(&reset_link, &token, user.is_active, dependent_count);

        // Fire-and-forget: the response never waits on SMTP, and delivery
        // failures stay inside the task.
        let mailer = state.mailer.clone();
        let to = user.email.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, RESET_EMAIL_SUBJECT, &body).await {
                error!(error = %e, "password reset email dispatch failed");
            }
        });

        info!(user_id = %user.id, "password reset requested");
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUEST_ACK.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = state
        .reset_tokens
        .lookup(&payload.token)
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    // The account may have vanished between request and confirm
    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(internal)?
        .ok_or(ApiError::UserNotFound)?;

    let hash = hash_password(&payload.new_password).map_err(internal)?;
    User::update_password(&state.db, user.id, &hash)
        .await
        .map_err(internal)?;

    // Deleted only after the new password is persisted; deletion is what
    // makes the token single-use.
    state.reset_tokens.remove(&payload.token);

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@x"));
    }

    #[test]
    fn reset_ack_is_uniform() {
        // The same payload is returned whether or not the email exists, so
        // responses cannot be used to enumerate accounts.
        let known = MessageResponse {
            message: RESET_REQUEST_ACK.into(),
        };
        let unknown = MessageResponse {
            message: RESET_REQUEST_ACK.into(),
        };
        assert_eq!(
            serde_json::to_string(&known).unwrap(),
            serde_json::to_string(&unknown).unwrap()
        );
    }

    #[test]
    fn login_response_shape() {
        let response = LoginResponse {
            access_token: "jwt".into(),
            token_type: "bearer".into(),
            user: PublicUser {
                id: 1,
                email: "test@example.com".into(),
                first_name: None,
                last_name: None,
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"token_type\":\"bearer\""));
        assert!(json.contains("\"access_token\":\"jwt\""));
        assert!(json.contains("test@example.com"));
    }
}
