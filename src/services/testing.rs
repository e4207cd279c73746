use crate::{
    composer::compose_recipe,
    jwt::SessionData,
    memory::{MemoryImageStore, MemoryStore},
    repository::CatalogRepository,
    schema::{Id, Ingredient, IngredientAmount, RecipeForm, RecipeView, Tag, UserRole},
};

pub const IMAGE: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// A seeded in-memory store with a small catalog.
pub struct Kitchen {
    pub store: MemoryStore,
    pub images: MemoryImageStore,
    pub flour: Ingredient,
    pub egg: Ingredient,
    pub sugar: Ingredient,
    pub breakfast: Tag,
    pub dinner: Tag,
}

impl Kitchen {
    pub async fn new() -> Self {
        let store = MemoryStore::new();

        let flour = store.upsert_ingredient("flour", "g").await.unwrap();
        let egg = store.upsert_ingredient("egg", "pcs").await.unwrap();
        let sugar = store.upsert_ingredient("sugar", "g").await.unwrap();
        let breakfast = store.upsert_tag("Breakfast", "breakfast").await.unwrap();
        let dinner = store.upsert_tag("Dinner", "dinner").await.unwrap();

        Self {
            store,
            images: MemoryImageStore::new(),
            flour,
            egg,
            sugar,
            breakfast,
            dinner,
        }
    }

    pub async fn session(&self, username: &str, role: UserRole) -> SessionData {
        let user = self.store.add_user(username, role).await;
        SessionData {
            user_id: user.id,
            username: user.username,
            is_admin: user.role == UserRole::Admin,
            role: user.role,
        }
    }

    pub fn form(&self, name: &str, tags: Vec<Id>, lines: &[(Id, i32)]) -> RecipeForm {
        RecipeForm {
            name: Some(name.to_string()),
            text: Some(format!("How to make {name}")),
            image: Some(IMAGE.to_string()),
            cooking_time: Some(10),
            tags: Some(tags),
            ingredients: Some(
                lines
                    .iter()
                    .map(|(id, amount)| IngredientAmount {
                        id: *id,
                        amount: *amount,
                    })
                    .collect(),
            ),
        }
    }

    pub async fn recipe(
        &self,
        author: &SessionData,
        name: &str,
        lines: &[(Id, i32)],
    ) -> RecipeView {
        let form = self.form(name, vec![self.breakfast.id], lines);
        compose_recipe(&self.store, &self.images, Some(author), form)
            .await
            .unwrap()
    }
}
