use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::ServiceError,
    schema::{Id, Tag},
};

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, ServiceError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ServiceError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn existing_tag_ids(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, ServiceError> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids.to_vec())
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn upsert_tag(name: &str, slug: &str, pool: &Pool<Postgres>) -> Result<Tag, ServiceError> {
    let tag: Tag = sqlx::query_as(
        "
        INSERT INTO tags (name, slug)
        VALUES ($1, $2)
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING *
    ",
    )
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await?;

    Ok(tag)
}

pub async fn list_recipe_tags(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<Tag>, ServiceError> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.id AS id, t.name AS name, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

/// Drops every tag link of the recipe and links `tags` instead.
/// Must run on a connection that is inside the recipe's transaction.
pub async fn replace_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    insert_recipe_tags(recipe_id, tags, conn).await
}

pub async fn insert_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });

    builder.build().execute(&mut *conn).await?;

    Ok(())
}
