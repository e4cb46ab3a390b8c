use super::extractors::AuthUser;
use super::models::{Credentials, NewUser, Role, SafeUser, User, normalize_email};
use crate::config::StaffAccount;
use crate::session::{Session, SessionUser};
use crate::utils::types::{ApiResult, Pool};
use crate::utils::{AppError, AppJson, FormErrors, ValidatedJson, internal_error};
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use bcrypt::{DEFAULT_COST, hash, verify};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::RunQueryDsl;
use tracing::info;
use uuid::Uuid;

pub async fn create_user(
    State(pool): State<Pool>,
    ValidatedJson(payload): ValidatedJson<NewUser>,
) -> Result<(StatusCode, Json<SafeUser>), AppError> {
    let user = insert_user(&pool, &payload.email, payload.password, Role::Customer).await?;

    info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login_user(
    State(pool): State<Pool>,
    session: Session,
    AppJson(payload): AppJson<Credentials>,
) -> ApiResult<SafeUser> {
    use axum_store::schema::users;

    let mut conn = pool.get().await.map_err(internal_error)?;

    let user = users::table
        .filter(users::email.eq(normalize_email(&payload.email)))
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let user = SafeUser::from(user);
    let session_user = SessionUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    };
    session.cycle();
    session.update(|data| data.user = Some(session_user));

    info!(user_id = %user.id, "user logged in");

    Ok(Json(user))
}

pub async fn logout(session: Session) -> StatusCode {
    session.flush();
    StatusCode::NO_CONTENT
}

pub async fn get_current_user(AuthUser(user): AuthUser) -> Json<SafeUser> {
    Json(SafeUser {
        id: user.id,
        email: user.email,
        role: user.role,
    })
}

/// Creates the configured staff account unless a user with that email exists.
pub async fn seed_staff_user(pool: &Pool, account: &StaffAccount) -> Result<(), AppError> {
    use axum_store::schema::users;

    let email = normalize_email(&account.email);

    let mut conn = pool.get().await.map_err(internal_error)?;
    let existing = users::table
        .filter(users::email.eq(&email))
        .select(users::id)
        .first::<Uuid>(&mut conn)
        .await
        .optional()?;
    drop(conn);

    if existing.is_some() {
        return Ok(());
    }

    let user = insert_user(pool, &email, account.password.clone(), Role::Staff).await?;
    info!(user_id = %user.id, email = %user.email, "staff account created");

    Ok(())
}

async fn insert_user(
    pool: &Pool,
    email: &str,
    password: String,
    role: Role,
) -> Result<SafeUser, AppError> {
    use axum_store::schema::users;

    let password_hash = create_password_hash(password).await?;

    let user = User {
        id: Uuid::new_v4(),
        email: normalize_email(email),
        password_hash,
        role,
    };

    let mut conn = pool.get().await.map_err(internal_error)?;

    diesel::insert_into(users::table)
        .values(&user)
        .returning(SafeUser::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                let mut errors = FormErrors::default();
                errors.add("email", "A user with this email already exists.");
                AppError::Validation(errors)
            }
            other => AppError::from(other),
        })
}

async fn create_password_hash(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| internal_error(format!("Hashing task failed: {}", e)))?
        .map_err(|e| internal_error(format!("Hashing error: {}", e)))
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| internal_error(format!("Verification task failed: {}", e)))?
        .map_err(|e| internal_error(format!("Verification error: {}", e)))
}
