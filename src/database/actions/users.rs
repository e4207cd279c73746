use sqlx::{Pool, Postgres};

use crate::{
    error::ServiceError,
    schema::{Id, User},
};

pub async fn get_user_by_id(user_id: Id, pool: &Pool<Postgres>) -> Result<Option<User>, ServiceError> {
    let row: Option<User> = sqlx::query_as(
        "SELECT id, email, username, first_name, last_name, role FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn is_subscribed(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let row: Option<(Id,)> =
        sqlx::query_as("SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<bool, ServiceError> {
    let result = sqlx::query(
        "
        INSERT INTO subscriptions (user_id, author_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING;
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn unsubscribe(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_subscriptions(user_id: Id, pool: &Pool<Postgres>) -> Result<Vec<User>, ServiceError> {
    let rows: Vec<User> = sqlx::query_as(
        "
        SELECT u.id AS id, u.email AS email, u.username AS username,
            u.first_name AS first_name, u.last_name AS last_name, u.role AS role
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.created_at DESC, u.id DESC
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
