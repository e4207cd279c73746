mod database {
    pub mod actions;
    pub mod error;
    pub mod images;
    pub mod memory;
    pub mod repository;
    pub mod schema;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod services {
    pub mod composer;
    pub mod importer;
    pub mod membership;
    pub mod recipes;
    pub mod shopping;
    pub mod shortlink;
    pub mod subscriptions;

    #[cfg(test)]
    pub(crate) mod testing;
}
mod config;
mod constants;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use services::*;
