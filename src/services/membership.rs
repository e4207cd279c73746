use crate::{
    error::ServiceError,
    jwt::SessionData,
    permissions::ActionType,
    repository::{MembershipRepository, RecipeRepository},
    schema::{Id, MembershipAction, MembershipSet, RecipeSummary},
};

fn action_for(set: MembershipSet) -> ActionType {
    match set {
        MembershipSet::Favorite => ActionType::ManageOwnFavorites,
        MembershipSet::Cart => ActionType::ManageOwnCart,
    }
}

/// Adds the recipe to or removes it from one of the caller's sets.
///
/// Adding returns the recipe summary. Adding an existing member is a conflict,
/// removing an absent one is not found. Either way the set is left untouched.
pub async fn toggle<S>(
    store: &S,
    session: Option<&SessionData>,
    recipe_id: Id,
    set: MembershipSet,
    action: MembershipAction,
) -> Result<Option<RecipeSummary>, ServiceError>
where
    S: RecipeRepository + MembershipRepository + ?Sized,
{
    let session = SessionData::require(session)?;
    session.authenticate(action_for(set))?;

    let Some(recipe) = store.get_recipe(recipe_id).await? else {
        return Err(ServiceError::not_found("Recipe"));
    };

    match action {
        MembershipAction::Add => {
            let already = || ServiceError::Conflict(format!("Recipe is already in {}", set.label()));

            let added = match store.add_member(session.user_id, recipe_id, set).await {
                Ok(added) => added,
                Err(ServiceError::Conflict(_)) => false,
                Err(e) => return Err(e),
            };
            if !added {
                return Err(already());
            }

            log::debug!(
                "User {} added recipe {recipe_id} to {}",
                session.user_id,
                set.label()
            );

            Ok(Some(recipe.into()))
        }
        MembershipAction::Remove => {
            if !store.remove_member(session.user_id, recipe_id, set).await? {
                return Err(ServiceError::not_found(format!(
                    "Recipe in {}",
                    set.label()
                )));
            }

            log::debug!(
                "User {} removed recipe {recipe_id} from {}",
                session.user_id,
                set.label()
            );

            Ok(None)
        }
    }
}

/// Anonymous viewers are never members of anything.
pub async fn is_in_set<S: MembershipRepository + ?Sized>(
    store: &S,
    viewer: Option<&SessionData>,
    recipe_id: Id,
    set: MembershipSet,
) -> Result<bool, ServiceError> {
    match viewer {
        Some(viewer) => store.is_member(viewer.user_id, recipe_id, set).await,
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::UserRole, testing::Kitchen};

    #[tokio::test]
    async fn add_then_remove() {
        let kitchen = Kitchen::new().await;
        let user = kitchen.session("user", UserRole::User).await;
        let recipe = kitchen.recipe(&user, "Toast", &[(kitchen.flour.id, 50)]).await;

        let summary = toggle(
            &kitchen.store,
            Some(&user),
            recipe.id,
            MembershipSet::Favorite,
            MembershipAction::Add,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(summary.id, recipe.id);
        assert_eq!(summary.name, "Toast");
        assert!(is_in_set(&kitchen.store, Some(&user), recipe.id, MembershipSet::Favorite)
            .await
            .unwrap());

        let removed = toggle(
            &kitchen.store,
            Some(&user),
            recipe.id,
            MembershipSet::Favorite,
            MembershipAction::Remove,
        )
        .await
        .unwrap();
        assert_eq!(removed, None);
        assert!(!is_in_set(&kitchen.store, Some(&user), recipe.id, MembershipSet::Favorite)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn repeated_toggles_are_rejected() {
        let kitchen = Kitchen::new().await;
        let user = kitchen.session("user", UserRole::User).await;
        let recipe = kitchen.recipe(&user, "Toast", &[(kitchen.flour.id, 50)]).await;

        let err = toggle(
            &kitchen.store,
            Some(&user),
            recipe.id,
            MembershipSet::Cart,
            MembershipAction::Remove,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 404);

        for expected in [None, Some(409)] {
            let result = toggle(
                &kitchen.store,
                Some(&user),
                recipe.id,
                MembershipSet::Cart,
                MembershipAction::Add,
            )
            .await;
            assert_eq!(result.err().map(|e| e.status_code()), expected);
        }
    }

    #[tokio::test]
    async fn sets_are_independent() {
        let kitchen = Kitchen::new().await;
        let user = kitchen.session("user", UserRole::User).await;
        let recipe = kitchen.recipe(&user, "Toast", &[(kitchen.flour.id, 50)]).await;

        toggle(
            &kitchen.store,
            Some(&user),
            recipe.id,
            MembershipSet::Cart,
            MembershipAction::Add,
        )
        .await
        .unwrap();

        assert!(is_in_set(&kitchen.store, Some(&user), recipe.id, MembershipSet::Cart)
            .await
            .unwrap());
        assert!(!is_in_set(&kitchen.store, Some(&user), recipe.id, MembershipSet::Favorite)
            .await
            .unwrap());
        assert!(!is_in_set(&kitchen.store, None, recipe.id, MembershipSet::Cart)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_recipes_and_anonymous_callers() {
        let kitchen = Kitchen::new().await;
        let user = kitchen.session("user", UserRole::User).await;

        let err = toggle(
            &kitchen.store,
            Some(&user),
            77,
            MembershipSet::Favorite,
            MembershipAction::Add,
        )
        .await
        .unwrap_err();
        assert_eq!(err, ServiceError::not_found("Recipe"));

        let err = toggle(
            &kitchen.store,
            None,
            77,
            MembershipSet::Favorite,
            MembershipAction::Add,
        )
        .await
        .unwrap_err();
        assert_eq!(err, ServiceError::NotAuthenticated);
    }
}
