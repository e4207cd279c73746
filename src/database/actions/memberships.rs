use sqlx::{Pool, Postgres};

use crate::{
    error::ServiceError,
    schema::{CartLine, Id, MembershipSet},
};

pub async fn is_member(
    user_id: Id,
    recipe_id: Id,
    set: MembershipSet,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let result: Option<(Id,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM recipe_memberships WHERE user_id = $1 AND recipe_id = $2 AND kind = $3
    ",
    )
    .bind(user_id)
    .bind(recipe_id)
    .bind(set)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// Relies on the (user_id, recipe_id, kind) primary key, so concurrent
/// double submits leave exactly one row and one of them reports false.
pub async fn add_member(
    user_id: Id,
    recipe_id: Id,
    set: MembershipSet,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let result = sqlx::query(
        "INSERT INTO recipe_memberships (user_id, recipe_id, kind) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .bind(set)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_member(
    user_id: Id,
    recipe_id: Id,
    set: MembershipSet,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let result = sqlx::query(
        "DELETE FROM recipe_memberships WHERE user_id = $1 AND recipe_id = $2 AND kind = $3",
    )
    .bind(user_id)
    .bind(recipe_id)
    .bind(set)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_cart_lines(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartLine>, ServiceError> {
    let rows: Vec<CartLine> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_memberships m
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = m.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE m.user_id = $1 AND m.kind = $2
        ORDER BY m.recipe_id, ri.position
    ",
    )
    .bind(user_id)
    .bind(MembershipSet::Cart)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
