use crate::{
    error::{ServiceError, ValidationError},
    jwt::SessionData,
    permissions::ActionType,
    repository::{RecipeRepository, UserRepository},
    schema::{Id, RecipeSummary, SubscriptionView, User, UserView},
};

/// Rejects negative limits. `None` means every recipe.
pub fn check_recipes_limit(limit: Option<i64>) -> Result<Option<i64>, ValidationError> {
    match limit {
        Some(limit) if limit < 0 => Err(ValidationError::InvalidLimit(limit)),
        _ => Ok(limit),
    }
}

async fn subscription_view<S>(
    store: &S,
    author: User,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionView, ServiceError>
where
    S: RecipeRepository + UserRepository + ?Sized,
{
    let recipes = store
        .list_author_recipes(author.id, recipes_limit)
        .await?
        .into_iter()
        .map(RecipeSummary::from)
        .collect();
    let recipes_count = store.count_author_recipes(author.id).await?;

    Ok(SubscriptionView {
        author: UserView::from_user(author, true),
        recipes,
        recipes_count,
    })
}

pub async fn subscribe<S>(
    store: &S,
    session: Option<&SessionData>,
    author_id: Id,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionView, ServiceError>
where
    S: RecipeRepository + UserRepository + ?Sized,
{
    let session = SessionData::require(session)?;
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let recipes_limit = check_recipes_limit(recipes_limit)?;

    let Some(author) = store.get_user(author_id).await? else {
        return Err(ServiceError::not_found("Author"));
    };

    if author.id == session.user_id {
        return Err(ValidationError::SelfSubscription.into());
    }

    if !store.subscribe(session.user_id, author.id).await? {
        return Err(ServiceError::Conflict(format!(
            "Already subscribed to {}",
            author.username
        )));
    }

    log::debug!("User {} subscribed to {}", session.user_id, author.id);

    subscription_view(store, author, recipes_limit).await
}

pub async fn unsubscribe<S: UserRepository + ?Sized>(
    store: &S,
    session: Option<&SessionData>,
    author_id: Id,
) -> Result<(), ServiceError> {
    let session = SessionData::require(session)?;
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if store.get_user(author_id).await?.is_none() {
        return Err(ServiceError::not_found("Author"));
    }

    if !store.unsubscribe(session.user_id, author_id).await? {
        return Err(ServiceError::not_found("Subscription"));
    }

    log::debug!("User {} unsubscribed from {author_id}", session.user_id);

    Ok(())
}

pub async fn list_subscriptions<S>(
    store: &S,
    session: Option<&SessionData>,
    recipes_limit: Option<i64>,
) -> Result<Vec<SubscriptionView>, ServiceError>
where
    S: RecipeRepository + UserRepository + ?Sized,
{
    let session = SessionData::require(session)?;
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let recipes_limit = check_recipes_limit(recipes_limit)?;

    let authors = store.list_subscriptions(session.user_id).await?;

    let mut list = Vec::with_capacity(authors.len());
    for author in authors {
        list.push(subscription_view(store, author, recipes_limit).await?);
    }

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::UserRole, testing::Kitchen};

    #[test]
    fn negative_limits_are_rejected() {
        assert_eq!(check_recipes_limit(None), Ok(None));
        assert_eq!(check_recipes_limit(Some(0)), Ok(Some(0)));
        assert_eq!(
            check_recipes_limit(Some(-1)),
            Err(ValidationError::InvalidLimit(-1))
        );
    }

    #[tokio::test]
    async fn subscription_lists_limited_recipes() {
        let kitchen = Kitchen::new().await;
        let author = kitchen.session("author", UserRole::User).await;
        let reader = kitchen.session("reader", UserRole::User).await;

        for name in ["One", "Two", "Three"] {
            kitchen.recipe(&author, name, &[(kitchen.egg.id, 1)]).await;
        }

        let view = subscribe(&kitchen.store, Some(&reader), author.user_id, Some(2))
            .await
            .unwrap();
        assert!(view.author.is_subscribed);
        assert_eq!(view.recipes_count, 3);
        assert_eq!(
            view.recipes.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["Three", "Two"]
        );

        let list = list_subscriptions(&kitchen.store, Some(&reader), None)
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].author.id, author.user_id);
        assert_eq!(list[0].recipes.len(), 3);
    }

    #[tokio::test]
    async fn invalid_subscriptions() {
        let kitchen = Kitchen::new().await;
        let author = kitchen.session("author", UserRole::User).await;
        let reader = kitchen.session("reader", UserRole::User).await;

        let err = subscribe(&kitchen.store, Some(&reader), reader.user_id, None)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Validation(ValidationError::SelfSubscription));

        let err = subscribe(&kitchen.store, Some(&reader), 999, None)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::not_found("Author"));

        subscribe(&kitchen.store, Some(&reader), author.user_id, None)
            .await
            .unwrap();
        let err = subscribe(&kitchen.store, Some(&reader), author.user_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn listing_needs_a_session_and_a_valid_limit() {
        let kitchen = Kitchen::new().await;
        let reader = kitchen.session("reader", UserRole::User).await;

        let err = list_subscriptions(&kitchen.store, None, None)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotAuthenticated);

        let err = list_subscriptions(&kitchen.store, Some(&reader), Some(-3))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Validation(ValidationError::InvalidLimit(-3)));

        for role in [UserRole::User, UserRole::Admin] {
            let session = kitchen.session(&format!("{role:?}"), role).await;
            assert!(list_subscriptions(&kitchen.store, Some(&session), Some(0))
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn unsubscribe_requires_a_subscription() {
        let kitchen = Kitchen::new().await;
        let author = kitchen.session("author", UserRole::User).await;
        let reader = kitchen.session("reader", UserRole::User).await;

        let err = unsubscribe(&kitchen.store, Some(&reader), author.user_id)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::not_found("Subscription"));

        subscribe(&kitchen.store, Some(&reader), author.user_id, None)
            .await
            .unwrap();
        unsubscribe(&kitchen.store, Some(&reader), author.user_id)
            .await
            .unwrap();

        assert!(list_subscriptions(&kitchen.store, Some(&reader), None)
            .await
            .unwrap()
            .is_empty());
    }
}
