pub mod ingredients;
pub mod memberships;
pub mod recipes;
pub mod tags;
pub mod users;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::config::Config;

use super::{
    error::ServiceError,
    repository::{CatalogRepository, MembershipRepository, RecipeRepository, UserRepository},
    schema::{
        CartLine, Id, Ingredient, MembershipSet, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
        RecipeIngredient, Tag, User,
    },
};

/// Postgres backed store. Every repository method maps onto one of the
/// query functions in the submodules.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, ServiceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        log::info!(
            "Connected to database ({} connections max)",
            config.database_max_connections
        );

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn search_ingredients(&self, prefix: &str) -> Result<Vec<Ingredient>, ServiceError> {
        ingredients::search_ingredients(prefix, &self.pool).await
    }

    async fn existing_ingredient_ids(&self, ids: &[Id]) -> Result<Vec<Id>, ServiceError> {
        ingredients::existing_ingredient_ids(ids, &self.pool).await
    }

    async fn upsert_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, ServiceError> {
        ingredients::upsert_ingredient(name, measurement_unit, &self.pool).await
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, ServiceError> {
        tags::get_tag(id, &self.pool).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ServiceError> {
        tags::list_tags(&self.pool).await
    }

    async fn existing_tag_ids(&self, ids: &[Id]) -> Result<Vec<Id>, ServiceError> {
        tags::existing_tag_ids(ids, &self.pool).await
    }

    async fn upsert_tag(&self, name: &str, slug: &str) -> Result<Tag, ServiceError> {
        tags::upsert_tag(name, slug, &self.pool).await
    }
}

#[async_trait]
impl RecipeRepository for PgStore {
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, ServiceError> {
        recipes::get_recipe(id, &self.pool).await
    }

    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Recipe, ServiceError> {
        recipes::create_recipe(recipe, &self.pool).await
    }

    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<Recipe, ServiceError> {
        recipes::update_recipe(id, changes, &self.pool).await
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, ServiceError> {
        recipes::delete_recipe(id, &self.pool).await
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, ServiceError> {
        tags::list_recipe_tags(recipe_id, &self.pool).await
    }

    async fn list_recipe_ingredients(
        &self,
        recipe_id: Id,
    ) -> Result<Vec<RecipeIngredient>, ServiceError> {
        recipes::list_recipe_ingredients(recipe_id, &self.pool).await
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
    ) -> Result<Vec<Recipe>, ServiceError> {
        recipes::fetch_recipes(filter, viewer, &self.pool).await
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, ServiceError> {
        recipes::list_author_recipes(author_id, limit, &self.pool).await
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, ServiceError> {
        recipes::count_author_recipes(author_id, &self.pool).await
    }
}

#[async_trait]
impl MembershipRepository for PgStore {
    async fn is_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError> {
        memberships::is_member(user_id, recipe_id, set, &self.pool).await
    }

    async fn add_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError> {
        memberships::add_member(user_id, recipe_id, set, &self.pool).await
    }

    async fn remove_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError> {
        memberships::remove_member(user_id, recipe_id, set, &self.pool).await
    }

    async fn cart_lines(&self, user_id: Id) -> Result<Vec<CartLine>, ServiceError> {
        memberships::list_cart_lines(user_id, &self.pool).await
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>, ServiceError> {
        users::get_user_by_id(id, &self.pool).await
    }

    async fn is_subscribed(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError> {
        users::is_subscribed(user_id, author_id, &self.pool).await
    }

    async fn subscribe(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError> {
        users::subscribe(user_id, author_id, &self.pool).await
    }

    async fn unsubscribe(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError> {
        users::unsubscribe(user_id, author_id, &self.pool).await
    }

    async fn list_subscriptions(&self, user_id: Id) -> Result<Vec<User>, ServiceError> {
        users::list_subscriptions(user_id, &self.pool).await
    }
}
