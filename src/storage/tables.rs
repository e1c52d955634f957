use redb::TableDefinition;

/// Users: user_id -> User (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: email -> user_id
pub const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Books: book_id -> Book (msgpack)
pub const BOOKS: TableDefinition<&str, &[u8]> = TableDefinition::new("books");

/// Reviews: review_id -> Review (msgpack)
pub const REVIEWS: TableDefinition<&str, &[u8]> = TableDefinition::new("reviews");

/// Secondary index: book_id -> Vec<review_id> (for listing and cascading)
pub const BOOK_REVIEWS: TableDefinition<&str, &[u8]> = TableDefinition::new("book_reviews");

/// Unique index: "book_id:user_id" -> review_id
pub const REVIEW_OWNERS: TableDefinition<&str, &str> = TableDefinition::new("review_owners");
