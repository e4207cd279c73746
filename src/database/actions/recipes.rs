use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::ServiceError,
    schema::{
        Id, IngredientAmount, MembershipSet, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
        RecipeIngredient,
    },
};

use super::tags::{insert_recipe_tags, replace_recipe_tags};

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ServiceError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Inserts the recipe row, tag links and ingredient lines in one transaction.
pub async fn create_recipe(
    recipe: NewRecipe,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ServiceError> {
    let mut tx = pool.begin().await?;

    let row: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(recipe.author_id)
    .bind(recipe.name)
    .bind(recipe.text)
    .bind(recipe.image)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tx)
    .await?;

    insert_recipe_tags(row.id, &recipe.tags, &mut tx).await?;
    insert_recipe_ingredients(row.id, &recipe.ingredients, &mut tx).await?;

    tx.commit().await?;

    Ok(row)
}

/// Applies the changes in one transaction. The UPDATE runs first so the row
/// lock is held while child rows are replaced.
pub async fn update_recipe(
    id: Id,
    changes: RecipeChanges,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ServiceError> {
    let mut tx = pool.begin().await?;

    let row: Option<Recipe> = sqlx::query_as(
        "
        UPDATE recipes
        SET name = COALESCE($1, name),
            text = COALESCE($2, text),
            image = COALESCE($3, image),
            cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(changes.name)
    .bind(changes.text)
    .bind(changes.image)
    .bind(changes.cooking_time)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Err(ServiceError::not_found("Recipe"));
    };

    if let Some(tags) = changes.tags {
        replace_recipe_tags(id, &tags, &mut tx).await?;
    }

    if let Some(ingredients) = changes.ingredients {
        replace_recipe_ingredients(id, &ingredients, &mut tx).await?;
    }

    tx.commit().await?;

    Ok(row)
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<bool, ServiceError> {
    // Links, lines and memberships go with it (ON DELETE CASCADE)
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn replace_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmount],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    insert_recipe_ingredients(recipe_id, ingredients, conn).await
}

async fn insert_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmount],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount, position) ",
    );
    builder.push_values(
        ingredients.iter().enumerate(),
        |mut row, (position, line)| {
            row.push_bind(recipe_id)
                .push_bind(line.id)
                .push_bind(line.amount)
                .push_bind(position as i32);
        },
    );

    builder.build().execute(&mut *conn).await?;

    Ok(())
}

pub async fn list_recipe_ingredients(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredient>, ServiceError> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.position
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ServiceError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    // Membership filters only narrow the list for a known viewer
    if let Some(viewer) = viewer {
        let sets = [
            (filter.is_favorited, MembershipSet::Favorite),
            (filter.is_in_shopping_cart, MembershipSet::Cart),
        ];

        for (wanted, set) in sets {
            if wanted != Some(true) {
                continue;
            }

            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_memberships m \
                     WHERE m.recipe_id = r.id AND m.user_id = ",
                )
                .push_bind(viewer)
                .push(" AND m.kind = ")
                .push_bind(set)
                .push(")");
        }
    }

    builder.push(" ORDER BY r.id DESC");

    let rows: Vec<Recipe> = builder.build_query_as().fetch_all(pool).await?;

    Ok(rows)
}

pub async fn list_author_recipes(
    author_id: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ServiceError> {
    // LIMIT NULL is no limit
    let rows: Vec<Recipe> =
        sqlx::query_as("SELECT * FROM recipes WHERE author_id = $1 ORDER BY id DESC LIMIT $2")
            .bind(author_id)
            .bind(limit)
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, ServiceError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}
