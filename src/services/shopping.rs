use std::collections::BTreeMap;

use warp::{http::header, reply::Response, Reply};

use crate::{
    constants::{SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_FILE_NAME, SHOPPING_LIST_HEADER},
    error::ServiceError,
    jwt::SessionData,
    permissions::ActionType,
    repository::MembershipRepository,
    schema::{CartLine, ShoppingListItem},
};

/// Sums amounts per (name, measurement unit) pair.
///
/// The result is ordered by name, then unit, comparing code points. The order
/// is case-sensitive and independent of any database collation, and it does
/// not depend on the order of `lines`. Totals are widened so large carts can't overflow.
pub fn aggregate(lines: impl IntoIterator<Item = CartLine>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for line in lines {
        *totals
            .entry((line.name, line.measurement_unit))
            .or_default() += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListItem {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

pub async fn aggregate_shopping_list<S: MembershipRepository + ?Sized>(
    store: &S,
    session: Option<&SessionData>,
) -> Result<Vec<ShoppingListItem>, ServiceError> {
    let session = SessionData::require(session)?;
    session.authenticate(ActionType::ManageOwnCart)?;

    let lines = store.cart_lines(session.user_id).await?;
    let items = aggregate(lines);

    log::debug!(
        "Aggregated {} shopping list items for user {}",
        items.len(),
        session.user_id
    );

    Ok(items)
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut body = String::from(SHOPPING_LIST_HEADER);
    body.push('\n');

    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "{} - {} {}",
                item.name, item.total_amount, item.measurement_unit
            )
        })
        .collect();
    body.push_str(&lines.join("\n"));

    body
}

/// A downloadable plain text shopping list.
#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingListDocument {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl ShoppingListDocument {
    pub fn new(items: &[ShoppingListItem]) -> Self {
        Self {
            file_name: SHOPPING_LIST_FILE_NAME,
            content_type: SHOPPING_LIST_CONTENT_TYPE,
            body: render_shopping_list(items),
        }
    }
}

impl Reply for ShoppingListDocument {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.file_name);
        let reply = warp::reply::with_header(self.body, header::CONTENT_TYPE, self.content_type);

        warp::reply::with_header(reply, header::CONTENT_DISPOSITION, disposition).into_response()
    }
}

pub async fn download_shopping_list<S: MembershipRepository + ?Sized>(
    store: &S,
    session: Option<&SessionData>,
) -> Result<ShoppingListDocument, ServiceError> {
    let items = aggregate_shopping_list(store, session).await?;
    Ok(ShoppingListDocument::new(&items))
}
