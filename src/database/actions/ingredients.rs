use sqlx::{Pool, Postgres};

use crate::{
    error::ServiceError,
    schema::{Id, Ingredient},
};

/// Escapes LIKE wildcards so the search matches the prefix literally.
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    format!("{escaped}%")
}

pub async fn search_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ServiceError> {
    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name, id")
            .bind(like_prefix(prefix))
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

pub async fn existing_ingredient_ids(
    ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<Id>, ServiceError> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids.to_vec())
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn upsert_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ServiceError> {
    // The no-op update makes RETURNING yield the existing row on conflict
    let row: Ingredient = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT (name, measurement_unit) DO UPDATE SET name = EXCLUDED.name
        RETURNING *
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
