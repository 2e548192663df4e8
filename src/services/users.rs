//! Registration, login and user administration.

use anyhow::Context;
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, pg::Pg};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::{
        app_error::AppError,
        auth::{TokenService, hash_password, verify_password},
        db::Deleted,
        pagination::{Paginated, Pagination},
    },
    models::{CreateUserEntity, Role, UpdateUserEntity, UserEntity},
    schema::users,
};

pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterReq {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct UpdateUserReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserEntity,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Name must not be empty".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

fn users_query(deleted: Deleted) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if deleted.excluded() {
        query = query.filter(users::deleted_at.is_null());
    }
    query
}

pub async fn find_by_email(
    conn: &mut AsyncPgConnection,
    email: &str,
    deleted: Deleted,
) -> Result<Option<UserEntity>, AppError> {
    let user = users_query(deleted)
        .filter(users::email.eq(normalize_email(email)))
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get user by email")?;
    Ok(user)
}

async fn ensure_email_free(
    conn: &mut AsyncPgConnection,
    email: &str,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    // The unique index covers deleted rows too.
    if let Some(existing) = find_by_email(conn, email, Deleted::Include).await? {
        if Some(existing.id) != except {
            return Err(AppError::Conflict("Email already registered".into()));
        }
    }
    Ok(())
}

pub async fn register(
    conn: &mut AsyncPgConnection,
    tokens: &TokenService,
    body: RegisterReq,
) -> Result<AuthResponse, AppError> {
    validate_name(&body.name)?;
    let email = normalize_email(&body.email);
    validate_email(&email)?;
    validate_password(&body.password)?;
    ensure_email_free(conn, &email, None).await?;

    let user = diesel::insert_into(users::table)
        .values(CreateUserEntity {
            name: body.name.trim().to_string(),
            email,
            password: hash_password(&body.password)?,
            role: Role::Customer,
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(AppError::from)?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(AuthResponse {
        access_token: tokens.issue(&user)?,
        user,
    })
}

pub async fn login(
    conn: &mut AsyncPgConnection,
    tokens: &TokenService,
    body: LoginReq,
) -> Result<AuthResponse, AppError> {
    let user = find_by_email(conn, &body.email, Deleted::Exclude)
        .await?
        .filter(|user| verify_password(&body.password, &user.password))
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    Ok(AuthResponse {
        access_token: tokens.issue(&user)?,
        user,
    })
}

pub async fn admin_login(
    conn: &mut AsyncPgConnection,
    tokens: &TokenService,
    body: LoginReq,
) -> Result<AuthResponse, AppError> {
    let response = login(conn, tokens, body).await?;
    if response.user.role != Role::Admin {
        return Err(AppError::ForbiddenResource(
            "Only admin users can access this resource".into(),
        ));
    }
    Ok(response)
}

pub async fn find_one(conn: &mut AsyncPgConnection, id: Uuid) -> Result<UserEntity, AppError> {
    users_query(Deleted::Exclude)
        .filter(users::id.eq(id))
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get user")?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn find_all(
    conn: &mut AsyncPgConnection,
    pagination: Pagination,
) -> Result<Paginated<UserEntity>, AppError> {
    let total: i64 = users_query(Deleted::Exclude)
        .count()
        .get_result(conn)
        .await
        .context("Failed to count users")?;

    let data = users_query(Deleted::Exclude)
        .order_by((users::created_at.desc(), users::id))
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select(UserEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get users")?;

    Ok(Paginated::new(data, pagination, total))
}

pub async fn update(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    body: UpdateUserReq,
) -> Result<UserEntity, AppError> {
    if let Some(name) = &body.name {
        validate_name(name)?;
    }
    let email = body.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        validate_email(email)?;
        ensure_email_free(conn, email, Some(id)).await?;
    }
    let password = match &body.password {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let user = diesel::update(users::table.find(id).filter(users::deleted_at.is_null()))
        .set(UpdateUserEntity {
            name: body.name.map(|n| n.trim().to_string()),
            email,
            password,
            updated_at: Some(Utc::now()),
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .map_err(AppError::from)?;

    user.ok_or_else(|| AppError::not_found("User"))
}

pub async fn remove(conn: &mut AsyncPgConnection, id: Uuid) -> Result<UserEntity, AppError> {
    let user = diesel::update(users::table.find(id).filter(users::deleted_at.is_null()))
        .set(users::deleted_at.eq(Some(Utc::now())))
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to delete user")?
        .ok_or_else(|| AppError::not_found("User"))?;

    tracing::info!(user_id = %user.id, "User deleted");
    Ok(user)
}
