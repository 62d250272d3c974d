use crate::{
    authentication::{cryptography::password_matches, jwt::generate_jwt_session},
    error::{invalid_request, QueryError},
    pagination::PageRequest,
    schema::{Id, NewUser, User, UserRole, UserRow},
};

use sqlx::{Pool, Postgres};

const USER_ROW_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed
";

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_username(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user; `password_hash` is the argon2 hash of their password.
/// Returns `None` when the email or username is already taken.
pub async fn register_user(
    new_user: &NewUser,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&new_user.email)
    .bind(&new_user.username)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.password_hash)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    if let Some(user) = &row {
        log::info!("Registered user {} ({})", user.username, user.id);
    }

    Ok(row)
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime: chrono::Duration,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let user = match get_user_by_email(pool, email).await? {
        Some(user) => user,
        None => return Err(invalid_request("Unable to log in with provided credentials.")),
    };

    if !password_matches(password, &user.password) {
        return Err(invalid_request("Unable to log in with provided credentials."));
    }

    generate_jwt_session(&user, secret, lifetime)
}

pub async fn set_password(
    user_id: Id,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Returns whether a user with that email existed.
pub async fn set_role(email: &str, role: UserRole, pool: &Pool<Postgres>) -> Result<bool, potion::Error> {
    let result = sqlx::query("UPDATE users SET role = $2 WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .bind(role)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

/// Lists users as seen by `viewer`, with the total row count.
pub async fn fetch_users(
    viewer: Option<Id>,
    page: &PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<UserRow>, i64), potion::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_ROW_COLUMNS}, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset() > 0 => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?,
        None => 0,
    };
    Ok((rows, total_count))
}

pub async fn get_profile(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserRow>, potion::Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_ROW_COLUMNS} FROM users u WHERE u.id = $2"
    ))
    .bind(viewer)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}
