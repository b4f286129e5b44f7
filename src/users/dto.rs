use serde::Deserialize;

/// Registration form posted by `register.html`.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Body of `/users/update`, as JSON or as the `update.html` form.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default, alias = "userID", alias = "user_id")]
    pub id: String,
    #[serde(default, alias = "newUsername", alias = "username")]
    pub name: Option<String>,
    #[serde(default, alias = "newEmail")]
    pub email: Option<String>,
    #[serde(default, alias = "newPassword")]
    pub password: Option<String>,
}

/// Body of `/users/delete`, as JSON or as the `delete.html` form.
#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    #[serde(default, alias = "userID", alias = "user_id")]
    pub id: String,
}

/// Trims and drops blank values, which the HTML forms submit for untouched inputs.
pub fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Drops blank passwords but keeps the rest exactly as typed.
pub fn given_password(v: Option<String>) -> Option<String> {
    v.filter(|p| !p.trim().is_empty())
}
