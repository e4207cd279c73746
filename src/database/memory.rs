use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use super::{
    error::ServiceError,
    images::{Base64Image, ImageStore},
    repository::{CatalogRepository, MembershipRepository, RecipeRepository, UserRepository},
    schema::{
        CartLine, Id, Ingredient, IngredientAmount, MembershipSet, NewRecipe, Recipe,
        RecipeChanges, RecipeFilter, RecipeIngredient, Tag, User, UserRole,
    },
};

#[derive(Debug, Clone)]
struct StoredRecipe {
    row: Recipe,
    tags: Vec<Id>,
    ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: Id,
    users: BTreeMap<Id, User>,
    ingredients: BTreeMap<Id, Ingredient>,
    tags: BTreeMap<Id, Tag>,
    recipes: BTreeMap<Id, StoredRecipe>,
    memberships: BTreeSet<(Id, Id, MembershipSet)>,
    // (user, author) in subscription order
    subscriptions: Vec<(Id, Id)>,
}

impl MemoryState {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    /// Mirrors the foreign keys of the relational schema.
    fn check_references(
        &self,
        tags: Option<&[Id]>,
        ingredients: Option<&[IngredientAmount]>,
    ) -> Result<(), ServiceError> {
        if let Some(tags) = tags {
            if tags.iter().any(|id| !self.tags.contains_key(id)) {
                return Err(ServiceError::not_found("Referenced entry"));
            }
        }
        if let Some(ingredients) = ingredients {
            if ingredients
                .iter()
                .any(|line| !self.ingredients.contains_key(&line.id))
            {
                return Err(ServiceError::not_found("Referenced entry"));
            }
        }
        Ok(())
    }

    fn is_member(&self, user_id: Id, recipe_id: Id, set: MembershipSet) -> bool {
        self.memberships.contains(&(user_id, recipe_id, set))
    }
}

/// In-memory store with the same contract as the Postgres store.
///
/// Each operation holds a single lock for its whole duration, so composite
/// writes are atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users are owned by the identity service; this seeds one.
    pub async fn add_user(&self, username: &str, role: UserRole) -> User {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let user = User {
            id,
            email: format!("{username}@example.com"),
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: String::new(),
            role,
        };
        state.users.insert(id, user.clone());
        user
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn search_ingredients(&self, prefix: &str) -> Result<Vec<Ingredient>, ServiceError> {
        let prefix = prefix.to_lowercase();
        let state = self.state.read().await;

        let mut rows: Vec<Ingredient> = state
            .ingredients
            .values()
            .filter(|ingredient| ingredient.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(rows)
    }

    async fn existing_ingredient_ids(&self, ids: &[Id]) -> Result<Vec<Id>, ServiceError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.ingredients.contains_key(id))
            .collect())
    }

    async fn upsert_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, ServiceError> {
        let mut state = self.state.write().await;

        let existing = state
            .ingredients
            .values()
            .find(|i| i.name == name && i.measurement_unit == measurement_unit)
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let id = state.next_id();
        let ingredient = Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        };
        state.ingredients.insert(id, ingredient.clone());

        Ok(ingredient)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, ServiceError> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ServiceError> {
        Ok(self.state.read().await.tags.values().cloned().collect())
    }

    async fn existing_tag_ids(&self, ids: &[Id]) -> Result<Vec<Id>, ServiceError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.tags.contains_key(id))
            .collect())
    }

    async fn upsert_tag(&self, name: &str, slug: &str) -> Result<Tag, ServiceError> {
        let mut state = self.state.write().await;

        if let Some(tag) = state.tags.values_mut().find(|t| t.slug == slug) {
            tag.name = name.to_string();
            return Ok(tag.clone());
        }

        let id = state.next_id();
        let tag = Tag {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.tags.insert(id, tag.clone());

        Ok(tag)
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, ServiceError> {
        Ok(self
            .state
            .read()
            .await
            .recipes
            .get(&id)
            .map(|stored| stored.row.clone()))
    }

    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Recipe, ServiceError> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&recipe.author_id) {
            return Err(ServiceError::not_found("Referenced entry"));
        }
        state.check_references(Some(recipe.tags.as_slice()), Some(recipe.ingredients.as_slice()))?;

        let id = state.next_id();
        let row = Recipe {
            id,
            author_id: recipe.author_id,
            name: recipe.name,
            text: recipe.text,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
            created_at: Utc::now(),
        };
        state.recipes.insert(
            id,
            StoredRecipe {
                row: row.clone(),
                tags: recipe.tags,
                ingredients: recipe.ingredients,
            },
        );

        Ok(row)
    }

    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<Recipe, ServiceError> {
        let mut state = self.state.write().await;

        if !state.recipes.contains_key(&id) {
            return Err(ServiceError::not_found("Recipe"));
        }
        state.check_references(changes.tags.as_deref(), changes.ingredients.as_deref())?;

        let Some(stored) = state.recipes.get_mut(&id) else {
            return Err(ServiceError::not_found("Recipe"));
        };

        if let Some(name) = changes.name {
            stored.row.name = name;
        }
        if let Some(text) = changes.text {
            stored.row.text = text;
        }
        if let Some(image) = changes.image {
            stored.row.image = image;
        }
        if let Some(cooking_time) = changes.cooking_time {
            stored.row.cooking_time = cooking_time;
        }
        if let Some(tags) = changes.tags {
            stored.tags = tags;
        }
        if let Some(ingredients) = changes.ingredients {
            stored.ingredients = ingredients;
        }

        Ok(stored.row.clone())
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;

        if state.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        state
            .memberships
            .retain(|(_, recipe_id, _)| *recipe_id != id);

        Ok(true)
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, ServiceError> {
        let state = self.state.read().await;
        let Some(stored) = state.recipes.get(&recipe_id) else {
            return Ok(vec![]);
        };

        let mut tags: Vec<Tag> = stored
            .tags
            .iter()
            .filter_map(|id| state.tags.get(id).cloned())
            .collect();
        tags.sort_by_key(|tag| tag.id);

        Ok(tags)
    }

    async fn list_recipe_ingredients(
        &self,
        recipe_id: Id,
    ) -> Result<Vec<RecipeIngredient>, ServiceError> {
        let state = self.state.read().await;
        let Some(stored) = state.recipes.get(&recipe_id) else {
            return Ok(vec![]);
        };

        Ok(stored
            .ingredients
            .iter()
            .filter_map(|line| {
                state.ingredients.get(&line.id).map(|i| RecipeIngredient {
                    id: i.id,
                    name: i.name.to_owned(),
                    measurement_unit: i.measurement_unit.to_owned(),
                    amount: line.amount,
                })
            })
            .collect())
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
    ) -> Result<Vec<Recipe>, ServiceError> {
        let state = self.state.read().await;

        let slugs: HashSet<&str> = filter.tags.iter().map(String::as_str).collect();
        let tag_ids: HashSet<Id> = state
            .tags
            .values()
            .filter(|tag| slugs.contains(tag.slug.as_str()))
            .map(|tag| tag.id)
            .collect();

        let rows = state
            .recipes
            .values()
            .rev()
            .filter(|stored| {
                filter
                    .author
                    .map_or(true, |author| stored.row.author_id == author)
            })
            .filter(|stored| slugs.is_empty() || stored.tags.iter().any(|id| tag_ids.contains(id)))
            .filter(|stored| match viewer {
                Some(viewer) => {
                    let wanted = |flag: Option<bool>, set| {
                        flag != Some(true) || state.is_member(viewer, stored.row.id, set)
                    };
                    wanted(filter.is_favorited, MembershipSet::Favorite)
                        && wanted(filter.is_in_shopping_cart, MembershipSet::Cart)
                }
                None => true,
            })
            .map(|stored| stored.row.clone())
            .collect();

        Ok(rows)
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, ServiceError> {
        let state = self.state.read().await;
        let limit = limit.map_or(usize::MAX, |limit| limit.max(0) as usize);

        Ok(state
            .recipes
            .values()
            .rev()
            .filter(|stored| stored.row.author_id == author_id)
            .take(limit)
            .map(|stored| stored.row.clone())
            .collect())
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, ServiceError> {
        let state = self.state.read().await;
        Ok(state
            .recipes
            .values()
            .filter(|stored| stored.row.author_id == author_id)
            .count() as i64)
    }
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn is_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError> {
        Ok(self.state.read().await.is_member(user_id, recipe_id, set))
    }

    async fn add_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) || !state.recipes.contains_key(&recipe_id) {
            return Err(ServiceError::not_found("Referenced entry"));
        }
        Ok(state.memberships.insert((user_id, recipe_id, set)))
    }

    async fn remove_member(
        &self,
        user_id: Id,
        recipe_id: Id,
        set: MembershipSet,
    ) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;
        Ok(state.memberships.remove(&(user_id, recipe_id, set)))
    }

    async fn cart_lines(&self, user_id: Id) -> Result<Vec<CartLine>, ServiceError> {
        let state = self.state.read().await;

        let lines = state
            .memberships
            .iter()
            .filter(|(user, _, set)| *user == user_id && *set == MembershipSet::Cart)
            .filter_map(|(_, recipe_id, _)| state.recipes.get(recipe_id))
            .flat_map(|stored| stored.ingredients.iter())
            .filter_map(|line| {
                state.ingredients.get(&line.id).map(|i| CartLine {
                    name: i.name.to_owned(),
                    measurement_unit: i.measurement_unit.to_owned(),
                    amount: line.amount,
                })
            })
            .collect();

        Ok(lines)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>, ServiceError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn is_subscribed(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError> {
        Ok(self
            .state
            .read()
            .await
            .subscriptions
            .contains(&(user_id, author_id)))
    }

    async fn subscribe(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;
        if state.subscriptions.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        state.subscriptions.push((user_id, author_id));
        Ok(true)
    }

    async fn unsubscribe(&self, user_id: Id, author_id: Id) -> Result<bool, ServiceError> {
        let mut state = self.state.write().await;
        let before = state.subscriptions.len();
        state
            .subscriptions
            .retain(|pair| *pair != (user_id, author_id));
        Ok(state.subscriptions.len() < before)
    }

    async fn list_subscriptions(&self, user_id: Id) -> Result<Vec<User>, ServiceError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .rev()
            .filter(|(user, _)| *user == user_id)
            .filter_map(|(_, author)| state.users.get(author).cloned())
            .collect())
    }
}

/// Keeps image uploads in memory and hands out `memory://` references.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: Mutex<Vec<Base64Image>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stored_count(&self) -> usize {
        self.images.lock().await.len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn store(&self, image: &Base64Image) -> Result<String, ServiceError> {
        let mut images = self.images.lock().await;
        images.push(image.clone());
        Ok(format!(
            "memory://recipes/images/{}.{}",
            images.len(),
            image.extension
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upserts_are_idempotent() {
        let store = MemoryStore::new();

        let first = store.upsert_ingredient("flour", "g").await.unwrap();
        let again = store.upsert_ingredient("flour", "g").await.unwrap();
        let other_unit = store.upsert_ingredient("flour", "kg").await.unwrap();

        assert_eq!(first, again);
        assert_ne!(first.id, other_unit.id);

        let tag = store.upsert_tag("Breakfast", "breakfast").await.unwrap();
        let renamed = store.upsert_tag("Morning", "breakfast").await.unwrap();
        assert_eq!(tag.id, renamed.id);
        assert_eq!(store.list_tags().await.unwrap(), vec![renamed]);
    }

    #[tokio::test]
    async fn insert_rejects_unknown_references() {
        let store = MemoryStore::new();
        let author = store.add_user("author", UserRole::User).await;

        let err = store
            .insert_recipe(NewRecipe {
                author_id: author.id,
                name: String::from("Ghost"),
                text: String::new(),
                image: String::from("img"),
                cooking_time: 1,
                tags: vec![404],
                ingredients: vec![],
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 404);
        assert!(store
            .list_recipes(&RecipeFilter::default(), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_a_recipe_drops_its_memberships() {
        let store = MemoryStore::new();
        let user = store.add_user("user", UserRole::User).await;
        let tag = store.upsert_tag("Lunch", "lunch").await.unwrap();
        let egg = store.upsert_ingredient("egg", "pcs").await.unwrap();
        let recipe = store
            .insert_recipe(NewRecipe {
                author_id: user.id,
                name: String::from("Omelette"),
                text: String::new(),
                image: String::from("img"),
                cooking_time: 5,
                tags: vec![tag.id],
                ingredients: vec![IngredientAmount { id: egg.id, amount: 2 }],
            })
            .await
            .unwrap();

        assert!(store
            .add_member(user.id, recipe.id, MembershipSet::Cart)
            .await
            .unwrap());
        assert!(store.delete_recipe(recipe.id).await.unwrap());
        assert!(!store.delete_recipe(recipe.id).await.unwrap());
        assert!(store.cart_lines(user.id).await.unwrap().is_empty());
    }
}
