//! Read models for books and reviews: filtering, sorting, pagination and
//! rating aggregation on top of the raw storage records.

mod listing;
pub mod query;
mod views;

pub use listing::{
    book_detail, book_view, list_books, list_reviews, reviews_for_book, BookFilter, ReviewFilter,
};
pub use query::{BookSort, Page, ReviewSort, SortOrder};
pub use views::{BookListing, BookRef, BookView, RatingStats, ReviewListing, ReviewView, UserRef};
