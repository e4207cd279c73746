use async_trait::async_trait;

use super::{
    error::ServiceError,
    schema::{
        CartLine, Id, Ingredient, MembershipSet, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
        RecipeIngredient, Tag, User,
    },
};

/// Ingredient and tag reference data.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Case-insensitive name prefix search, ordered by name.
    async fn search_ingredients(&self, prefix: &str) -> Result<Vec<Ingredient>, ServiceError>;

    /// Returns the subset of `ids` that exist in the catalog.
    async fn existing_ingredient_ids(&self, ids: &[Id]) -> Result<Vec<Id>, ServiceError>;

    /// Inserts the pair unless it already exists and returns the stored row.
    async fn upsert_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, ServiceError>;

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, ServiceError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, ServiceError>;

    async fn existing_tag_ids(&self, ids: &[Id]) -> Result<Vec<Id>, ServiceError>;

    async fn upsert_tag(&self, name: &str, slug: &str) -> Result<Tag, ServiceError>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, ServiceError>;

    /// Inserts the recipe row, its tag links and its ingredient lines as one unit.
    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Recipe, ServiceError>;

    /// Applies `changes` as one unit. Provided collections are deleted and
    /// reinserted in full; readers never observe the intermediate state.
    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<Recipe, ServiceError>;

    /// Removes the recipe together with its links, lines and memberships.
    async fn delete_recipe(&self, id: Id) -> Result<bool, ServiceError>;

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, ServiceError>;

    async fn list_recipe_ingredients(
        &self,
        recipe_id: Id,
    ) -> Result<Vec<RecipeIngredient>, ServiceError>;

    /// Newest first. `viewer` is only consulted by the favorite and cart filters.
    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
    ) -> Result<Vec<Recipe>, ServiceError>;

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, ServiceError>;

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn is_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError>;

    /// Returns false when the pair was already a member.
    async fn add_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError>;

    /// Returns false when the pair was not a member.
    async fn remove_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError>;

    /// Every ingredient line of every recipe in the user's cart, unaggregated.
    async fn cart_lines(&self, user_id: Id) -> Result<Vec<CartLine>, ServiceError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Id) -> Result<Option<User>, ServiceError>;

    async fn is_subscribed(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError>;

    /// Returns false when the subscription already existed.
    async fn subscribe(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError>;

    /// Returns false when there was nothing to remove.
    async fn unsubscribe(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError>;

    /// Authors the user follows, newest subscription first.
    async fn list_subscriptions(&self, user_id: Id) -> Result<Vec<User>, ServiceError>;
}

/// A store that can back every service in the crate.
pub trait Store: CatalogRepository + RecipeRepository + MembershipRepository + UserRepository {}

impl<T> Store for T where
    T: CatalogRepository + RecipeRepository + MembershipRepository + UserRepository
{
}
