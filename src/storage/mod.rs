mod books;
pub mod db;
pub mod models;
mod reviews;
mod tables;
mod users;

pub use db::{Database, DatabaseError};
pub use tables::*;
