use axum::{
    extract::State,
    http::{header::ALLOW, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bson::oid::ObjectId;
use minijinja::context;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    error::AppError,
    pages,
    state::AppState,
    users::{
        dto::{given_password, non_blank, DeleteUserRequest, RegisterForm, UpdateUserRequest},
        extractors::FormOrJson,
        password::hash_password,
        repo_types::{NewUser, User, UserChanges},
    },
};

pub fn register_routes() -> Router<AppState> {
    Router::new().route(
        "/register",
        get(register_form)
            .post(register)
            .fallback(|| method_not_allowed("GET, HEAD, POST")),
    )
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(list_users).fallback(|| method_not_allowed("GET, HEAD")),
        )
        .route(
            "/users/update",
            get(update_form)
                .post(update_user)
                .put(update_user)
                .fallback(|| method_not_allowed("GET, HEAD, POST, PUT")),
        )
        .route(
            "/users/delete",
            get(delete_form)
                .post(delete_user)
                .put(delete_user)
                .delete(delete_user)
                .fallback(|| method_not_allowed("GET, HEAD, POST, PUT, DELETE")),
        )
}

/// 405 with the route's `Allow` list.
pub async fn method_not_allowed(allow: &'static str) -> Response {
    let mut res = AppError::MethodNotAllowed.into_response();
    res.headers_mut().insert(ALLOW, HeaderValue::from_static(allow));
    res
}

pub async fn register_form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(state.pages.render(pages::REGISTER, context! {}).await?)
}

pub async fn update_form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(state.pages.render(pages::UPDATE, context! {}).await?)
}

pub async fn delete_form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(state.pages.render(pages::DELETE, context! {}).await?)
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<RegisterForm>,
) -> Result<Html<String>, AppError> {
    let password = match given_password(form.password) {
        Some(p) => p,
        None => {
            warn!("registration without password");
            return Err(AppError::BadRequest("password is required".into()));
        }
    };

    let password_hash = hash_password(&password).map_err(|e| {
        warn!(error = %e, "hash_password failed");
        e
    })?;

    let name = non_blank(form.name);
    let user = NewUser {
        name: name.clone(),
        email: non_blank(form.email),
        password_hash,
        created_at: OffsetDateTime::now_utc(),
    };
    let id = state.users.create(user).await.map_err(|e| {
        error!(error = %e, "create user failed");
        e
    })?;

    info!(user_id = %id, "user registered");
    Ok(state
        .pages
        .render(pages::SUCCESS, context! { name => name })
        .await?)
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = state.users.list_all().await.map_err(|e| {
        error!(error = %e, "list users failed");
        e
    })?;
    Ok(Json(users))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    FormOrJson(body): FormOrJson<UpdateUserRequest>,
) -> Result<StatusCode, AppError> {
    let id = parse_user_id(&body.id)?;

    let password_hash = match given_password(body.password) {
        Some(p) => Some(hash_password(&p)?),
        None => None,
    };
    let changes = UserChanges {
        name: non_blank(body.name),
        email: non_blank(body.email),
        password_hash,
    };
    if changes.is_empty() {
        warn!(user_id = %id, "update without fields");
        return Err(AppError::BadRequest("No fields to update".into()));
    }

    let matched = state.users.update_by_id(id, changes).await.map_err(|e| {
        error!(error = %e, user_id = %id, "update user failed");
        e
    })?;
    if matched == 0 {
        warn!(user_id = %id, "update matched no user");
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(user_id = %id, "user updated");
    Ok(StatusCode::OK)
}

#[instrument(skip(state, body))]
pub async fn delete_user(
    State(state): State<AppState>,
    FormOrJson(body): FormOrJson<DeleteUserRequest>,
) -> Result<StatusCode, AppError> {
    let id = parse_user_id(&body.id)?;

    let deleted = state.users.delete_by_id(id).await.map_err(|e| {
        error!(error = %e, user_id = %id, "delete user failed");
        e
    })?;
    if deleted == 0 {
        warn!(user_id = %id, "delete matched no user");
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(user_id = %id, "user deleted");
    Ok(StatusCode::OK)
}

fn parse_user_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| {
        warn!(user_id = %raw, "invalid user id");
        AppError::BadRequest("Invalid User ID".into())
    })
}
