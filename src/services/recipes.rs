use crate::{
    error::ServiceError,
    jwt::SessionData,
    membership::is_in_set,
    repository::{CatalogRepository, Store},
    schema::{Id, Ingredient, MembershipSet, Recipe, RecipeFilter, RecipeView, Tag, UserView},
};

/// Expands a recipe row into its read model as seen by `viewer`.
pub async fn recipe_view<S: Store + ?Sized>(
    store: &S,
    viewer: Option<&SessionData>,
    recipe: Recipe,
) -> Result<RecipeView, ServiceError> {
    let Some(author) = store.get_user(recipe.author_id).await? else {
        return Err(ServiceError::not_found("Author"));
    };

    let is_subscribed = match viewer {
        Some(viewer) if viewer.user_id != author.id => {
            store.is_subscribed(viewer.user_id, author.id).await?
        }
        _ => false,
    };

    let tags = store.list_recipe_tags(recipe.id).await?;
    let ingredients = store.list_recipe_ingredients(recipe.id).await?;
    let is_favorited = is_in_set(store, viewer, recipe.id, MembershipSet::Favorite).await?;
    let is_in_shopping_cart = is_in_set(store, viewer, recipe.id, MembershipSet::Cart).await?;

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author: UserView::from_user(author, is_subscribed),
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn get_recipe<S: Store + ?Sized>(
    store: &S,
    viewer: Option<&SessionData>,
    id: Id,
) -> Result<RecipeView, ServiceError> {
    let Some(recipe) = store.get_recipe(id).await? else {
        return Err(ServiceError::not_found("Recipe"));
    };

    recipe_view(store, viewer, recipe).await
}

/// Newest first. Favorite and cart filters are ignored for anonymous viewers.
pub async fn list_recipes<S: Store + ?Sized>(
    store: &S,
    viewer: Option<&SessionData>,
    filter: &RecipeFilter,
) -> Result<Vec<RecipeView>, ServiceError> {
    let rows = store
        .list_recipes(filter, viewer.map(|viewer| viewer.user_id))
        .await?;

    let mut list = Vec::with_capacity(rows.len());
    for recipe in rows {
        list.push(recipe_view(store, viewer, recipe).await?);
    }

    Ok(list)
}

pub async fn search_ingredients<S: CatalogRepository + ?Sized>(
    store: &S,
    prefix: Option<&str>,
) -> Result<Vec<Ingredient>, ServiceError> {
    store
        .search_ingredients(prefix.map(str::trim).unwrap_or_default())
        .await
}

pub async fn list_tags<S: CatalogRepository + ?Sized>(store: &S) -> Result<Vec<Tag>, ServiceError> {
    store.list_tags().await
}

pub async fn get_tag<S: CatalogRepository + ?Sized>(store: &S, id: Id) -> Result<Tag, ServiceError> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Tag"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        membership::toggle,
        schema::{MembershipAction, UserRole},
        testing::Kitchen,
    };

    #[tokio::test]
    async fn view_reflects_the_viewer() {
        let kitchen = Kitchen::new().await;
        let author = kitchen.session("author", UserRole::User).await;
        let reader = kitchen.session("reader", UserRole::User).await;
        let recipe = kitchen.recipe(&author, "Omelette", &[(kitchen.egg.id, 3)]).await;

        toggle(
            &kitchen.store,
            Some(&reader),
            recipe.id,
            MembershipSet::Cart,
            MembershipAction::Add,
        )
        .await
        .unwrap();

        let seen = get_recipe(&kitchen.store, Some(&reader), recipe.id).await.unwrap();
        assert!(seen.is_in_shopping_cart);
        assert!(!seen.is_favorited);

        let anonymous = get_recipe(&kitchen.store, None, recipe.id).await.unwrap();
        assert!(!anonymous.is_in_shopping_cart);
        assert!(!anonymous.author.is_subscribed);
        assert_eq!(anonymous.ingredients, seen.ingredients);

        let err = get_recipe(&kitchen.store, None, 404).await.unwrap_err();
        assert_eq!(err, ServiceError::not_found("Recipe"));
    }

    #[tokio::test]
    async fn filters_narrow_the_listing() {
        let kitchen = Kitchen::new().await;
        let author = kitchen.session("author", UserRole::User).await;
        let other = kitchen.session("other", UserRole::User).await;

        let first = kitchen.recipe(&author, "First", &[(kitchen.egg.id, 1)]).await;
        let second = kitchen.recipe(&other, "Second", &[(kitchen.flour.id, 100)]).await;

        let all = list_recipes(&kitchen.store, None, &RecipeFilter::default())
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let by_author = RecipeFilter {
            author: Some(author.user_id),
            ..Default::default()
        };
        let list = list_recipes(&kitchen.store, None, &by_author).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, first.id);

        let by_tag = RecipeFilter {
            tags: vec![String::from("dinner")],
            ..Default::default()
        };
        assert!(list_recipes(&kitchen.store, None, &by_tag)
            .await
            .unwrap()
            .is_empty());

        toggle(
            &kitchen.store,
            Some(&author),
            second.id,
            MembershipSet::Favorite,
            MembershipAction::Add,
        )
        .await
        .unwrap();

        let favorited = RecipeFilter {
            is_favorited: Some(true),
            ..Default::default()
        };
        let list = list_recipes(&kitchen.store, Some(&author), &favorited)
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, second.id);
        assert!(list[0].is_favorited);

        let list = list_recipes(&kitchen.store, None, &favorited).await.unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn catalog_lookups() {
        let kitchen = Kitchen::new().await;

        let found = search_ingredients(&kitchen.store, Some(" Su")).await.unwrap();
        assert_eq!(found, vec![kitchen.sugar.clone()]);

        let tags = list_tags(&kitchen.store).await.unwrap();
        assert_eq!(tags, vec![kitchen.breakfast.clone(), kitchen.dinner.clone()]);

        assert_eq!(
            get_tag(&kitchen.store, kitchen.dinner.id).await.unwrap(),
            kitchen.dinner
        );
        assert_eq!(
            get_tag(&kitchen.store, 999).await.unwrap_err(),
            ServiceError::not_found("Tag")
        );
    }
}
