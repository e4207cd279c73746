use std::fmt::{self, Display};

use thiserror::Error;

use super::schema::Id;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for QueryError {}

/// User-correctable problems with a request payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Tags are required")]
    MissingTags,
    #[error("Tag {0} is listed more than once")]
    DuplicateTag(Id),
    #[error("Ingredients are required")]
    MissingIngredients,
    #[error("Ingredient {0} is listed more than once")]
    DuplicateIngredient(Id),
    #[error("Amount of ingredient {ingredient_id} must be at least 1, got {amount}")]
    InvalidAmount { ingredient_id: Id, amount: i32 },
    #[error("Cooking time must be at least 1, got {0}")]
    InvalidCookingTime(i32),
    #[error("Image is required")]
    MissingImage,
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Field '{0}' is required")]
    MissingField(&'static str),
    #[error("Field '{field}' must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("Users can't subscribe to themselves")]
    SelfSubscription,
    #[error("recipes_limit must be a non-negative integer, got {0}")]
    InvalidLimit(i64),
    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },
}

impl ValidationError {
    /// Name of the request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingTags | ValidationError::DuplicateTag(_) => "tags",
            ValidationError::MissingIngredients
            | ValidationError::DuplicateIngredient(_)
            | ValidationError::InvalidAmount { .. } => "ingredients",
            ValidationError::InvalidCookingTime(_) => "cooking_time",
            ValidationError::MissingImage | ValidationError::InvalidImage(_) => "image",
            ValidationError::MissingField(field) | ValidationError::TooLong { field, .. } => *field,
            ValidationError::SelfSubscription => "author",
            ValidationError::InvalidLimit(_) => "recipes_limit",
            ValidationError::InvalidRecord { .. } => "file",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Validation failed on '{field}': {0}", field = .0.field())]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Permission(String),
    #[error("Authentication credentials were not provided")]
    NotAuthenticated,
    #[error("Query failed {0}")]
    Query(QueryError),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::NotAuthenticated => 401,
            ServiceError::Permission(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Query(_) | ServiceError::Storage(_) => 500,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::RowNotFound => return Self::not_found("Row"),
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                return Self::Conflict(String::from("Entry already exists"))
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                return Self::not_found("Referenced entry")
            }
            _ => {}
        }

        log::error!("Store failure: {value}");
        Self::Query(QueryError::from(value))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(value: std::io::Error) -> Self {
        log::error!("Storage failure: {value}");
        Self::Storage(value.to_string())
    }
}

impl From<ServiceError> for potion::Error {
    fn from(value: ServiceError) -> Self {
        potion::Error {
            code: value.status_code().into(),
            info: Some(value.to_string()),
            redirect: None,
        }
    }
}
