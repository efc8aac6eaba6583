pub mod db;
pub mod dedupe;
pub mod postgres;
pub mod store;

pub use db::Db;
pub use postgres::PgStore;
pub use store::{CatalogStore, CredentialSource, StoreSession, Table};
