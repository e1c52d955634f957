pub mod cookie;
pub mod generator;
pub mod password;
pub mod service;
pub mod tokens;

pub use tokens::{Claims, TokenError, TokenIssuer, TokenKind, TokenPair};
