use std::collections::HashSet;

use crate::{
    constants::RECIPE_NAME_MAX_LENGTH,
    error::{ServiceError, ValidationError},
    images::{Base64Image, ImageStore},
    jwt::SessionData,
    permissions::ActionType,
    recipes::recipe_view,
    repository::{CatalogRepository, RecipeRepository, Store},
    schema::{Id, IngredientAmount, NewRecipe, Recipe, RecipeChanges, RecipeForm, RecipeView},
};

pub fn validate_tags(tags: &[Id]) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::MissingTags);
    }

    let mut seen = HashSet::new();
    for tag in tags {
        if !seen.insert(*tag) {
            return Err(ValidationError::DuplicateTag(*tag));
        }
    }

    Ok(())
}

pub fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::MissingIngredients);
    }

    let mut seen = HashSet::new();
    for line in ingredients {
        if !seen.insert(line.id) {
            return Err(ValidationError::DuplicateIngredient(line.id));
        }
        if line.amount < 1 {
            return Err(ValidationError::InvalidAmount {
                ingredient_id: line.id,
                amount: line.amount,
            });
        }
    }

    Ok(())
}

pub fn validate_cooking_time(cooking_time: i32) -> Result<(), ValidationError> {
    if cooking_time < 1 {
        return Err(ValidationError::InvalidCookingTime(cooking_time));
    }
    Ok(())
}

/// Rejects blank values and, when `max` is set, values longer than `max` characters.
fn validate_text(
    value: String,
    field: &'static str,
    max: Option<usize>,
) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(ValidationError::TooLong { field, max });
        }
    }
    Ok(value)
}

/// Fails with the first referenced tag or ingredient the catalog doesn't know.
async fn check_references<S: CatalogRepository + ?Sized>(
    store: &S,
    tags: Option<&[Id]>,
    ingredients: Option<&[IngredientAmount]>,
) -> Result<(), ServiceError> {
    if let Some(tags) = tags {
        let existing: HashSet<Id> = store.existing_tag_ids(tags).await?.into_iter().collect();
        if let Some(missing) = tags.iter().find(|id| !existing.contains(id)) {
            return Err(ServiceError::not_found(format!("Tag {missing}")));
        }
    }

    if let Some(ingredients) = ingredients {
        let ids: Vec<Id> = ingredients.iter().map(|line| line.id).collect();
        let existing: HashSet<Id> = store
            .existing_ingredient_ids(&ids)
            .await?
            .into_iter()
            .collect();
        if let Some(missing) = ids.iter().find(|id| !existing.contains(id)) {
            return Err(ServiceError::not_found(format!("Ingredient {missing}")));
        }
    }

    Ok(())
}

/// Loads a recipe the session is allowed to change: its author or an admin.
pub async fn get_recipe_mut<S: RecipeRepository + ?Sized>(
    store: &S,
    session: &SessionData,
    id: Id,
) -> Result<Recipe, ServiceError> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    let Some(recipe) = store.get_recipe(id).await? else {
        return Err(ServiceError::not_found("Recipe"));
    };

    if recipe.author_id != session.user_id && !ActionType::ManageAllRecipes.authenticate(session) {
        log::warn!(
            "User {} tried to modify recipe {} of user {}",
            session.user_id,
            recipe.id,
            recipe.author_id
        );
        return Err(ServiceError::Permission(String::from(
            "You are not the author of this recipe",
        )));
    }

    Ok(recipe)
}

/// Validates the whole form, then stores the image and persists the recipe
/// with its tags and ingredient lines as one unit.
pub async fn compose_recipe<S, I>(
    store: &S,
    images: &I,
    session: Option<&SessionData>,
    form: RecipeForm,
) -> Result<RecipeView, ServiceError>
where
    S: Store + ?Sized,
    I: ImageStore + ?Sized,
{
    let session = SessionData::require(session)?;
    session.authenticate(ActionType::CreateRecipes)?;

    let tags = form.tags.ok_or(ValidationError::MissingTags)?;
    validate_tags(&tags)?;

    let ingredients = form.ingredients.ok_or(ValidationError::MissingIngredients)?;
    validate_ingredients(&ingredients)?;

    let cooking_time = form
        .cooking_time
        .ok_or(ValidationError::MissingField("cooking_time"))?;
    validate_cooking_time(cooking_time)?;

    let name = validate_text(
        form.name.unwrap_or_default(),
        "name",
        Some(RECIPE_NAME_MAX_LENGTH),
    )?;
    let text = validate_text(form.text.unwrap_or_default(), "text", None)?;

    let image = form.image.ok_or(ValidationError::MissingImage)?;
    let image = Base64Image::parse(&image)?;

    check_references(store, Some(tags.as_slice()), Some(ingredients.as_slice())).await?;

    let image = images.store(&image).await?;
    let recipe = store
        .insert_recipe(NewRecipe {
            author_id: session.user_id,
            name,
            text,
            image,
            cooking_time,
            tags,
            ingredients,
        })
        .await?;

    log::info!("User {} created recipe {}", session.user_id, recipe.id);

    recipe_view(store, Some(session), recipe).await
}

/// Applies a partial update. Omitted tags or ingredients stay as stored,
/// provided ones replace the stored collection in full.
pub async fn update_recipe<S, I>(
    store: &S,
    images: &I,
    session: Option<&SessionData>,
    id: Id,
    form: RecipeForm,
) -> Result<RecipeView, ServiceError>
where
    S: Store + ?Sized,
    I: ImageStore + ?Sized,
{
    let session = SessionData::require(session)?;
    get_recipe_mut(store, session, id).await?;

    if let Some(tags) = &form.tags {
        validate_tags(tags)?;
    }
    if let Some(ingredients) = &form.ingredients {
        validate_ingredients(ingredients)?;
    }
    if let Some(cooking_time) = form.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    let name = form
        .name
        .map(|name| validate_text(name, "name", Some(RECIPE_NAME_MAX_LENGTH)))
        .transpose()?;
    let text = form
        .text
        .map(|text| validate_text(text, "text", None))
        .transpose()?;
    let image = form
        .image
        .as_deref()
        .map(Base64Image::parse)
        .transpose()?;

    check_references(
        store,
        form.tags.as_deref(),
        form.ingredients.as_deref(),
    )
    .await?;

    let image = match image {
        Some(image) => Some(images.store(&image).await?),
        None => None,
    };

    let recipe = store
        .update_recipe(
            id,
            RecipeChanges {
                name,
                text,
                image,
                cooking_time: form.cooking_time,
                tags: form.tags,
                ingredients: form.ingredients,
            },
        )
        .await?;

    log::info!("User {} updated recipe {}", session.user_id, recipe.id);

    recipe_view(store, Some(session), recipe).await
}

pub async fn delete_recipe<S: RecipeRepository + ?Sized>(
    store: &S,
    session: Option<&SessionData>,
    id: Id,
) -> Result<(), ServiceError> {
    let session = SessionData::require(session)?;
    get_recipe_mut(store, session, id).await?;

    if !store.delete_recipe(id).await? {
        return Err(ServiceError::not_found("Recipe"));
    }

    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(())
}
