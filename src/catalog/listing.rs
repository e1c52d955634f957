use std::cmp::Ordering;
use std::collections::HashMap;

use super::query::{BookSort, Page, ReviewSort, SortOrder};
use super::views::{BookListing, BookRef, BookView, RatingStats, ReviewListing, ReviewView, UserRef};
use crate::storage::models::{Book, Review};
use crate::storage::{Database, DatabaseError};

/// Filters for the book catalog
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Exact genre match
    pub genre: Option<String>,
    pub page: Page,
    /// Case-insensitive substring of title or author
    pub search: Option<String>,
    pub sort: SortOrder<BookSort>,
}

/// Filters for the cross-book review listing
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub book_id: Option<String>,
    pub page: Page,
    pub sort: SortOrder<ReviewSort>,
    pub user_id: Option<String>,
}

impl BookFilter {
    fn matches(&self, book: &Book) -> bool {
        if let Some(genre) = &self.genre {
            if !book.genres.iter().any(|g| g == genre) {
                return false;
            }
        }

        match &self.search {
            Some(search) => {
                let needle = search.to_lowercase();
                book.title.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let ordering = match self.sort.field {
            BookSort::Author => a.author.to_lowercase().cmp(&b.author.to_lowercase()),
            BookSort::CreatedAt => a.created_at.cmp(&b.created_at),
            BookSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };
        self.sort.apply(ordering.then_with(|| a.id.cmp(&b.id)))
    }
}

impl ReviewFilter {
    fn matches(&self, review: &Review) -> bool {
        self.book_id.as_ref().map_or(true, |id| &review.book_id == id)
            && self.user_id.as_ref().map_or(true, |id| &review.user_id == id)
    }

    fn compare(&self, a: &Review, b: &Review) -> Ordering {
        let ordering = match self.sort.field {
            ReviewSort::CreatedAt => a.created_at.cmp(&b.created_at),
            ReviewSort::Rating => a.rating.cmp(&b.rating),
        };
        self.sort.apply(ordering.then_with(|| a.id.cmp(&b.id)))
    }
}

/// Resolves user ids to their public view, at most one lookup per id.
struct UserCache<'a> {
    db: &'a Database,
    seen: HashMap<String, Option<UserRef>>,
}

impl<'a> UserCache<'a> {
    fn new(db: &'a Database) -> Self {
        Self {
            db,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, id: &str) -> Result<Option<UserRef>, DatabaseError> {
        if let Some(found) = self.seen.get(id) {
            return Ok(found.clone());
        }
        let found = self.db.get_user(id)?.as_ref().map(UserRef::from);
        self.seen.insert(id.to_string(), found.clone());
        Ok(found)
    }
}

fn stats_by_book(reviews: &[Review]) -> HashMap<&str, RatingStats> {
    let mut ratings: HashMap<&str, Vec<u8>> = HashMap::new();
    for review in reviews {
        ratings
            .entry(review.book_id.as_str())
            .or_default()
            .push(review.rating);
    }

    ratings
        .into_iter()
        .map(|(book_id, r)| (book_id, RatingStats::from_ratings(r)))
        .collect()
}

/// One page of the catalog, each book with its rating stats.
pub fn list_books(db: &Database, filter: &BookFilter) -> Result<BookListing, DatabaseError> {
    let mut books: Vec<Book> = db
        .get_all_books()?
        .into_iter()
        .filter(|b| filter.matches(b))
        .collect();
    books.sort_by(|a, b| filter.compare(a, b));

    let total_books = books.len();
    let page = filter.page.slice(books);

    let reviews = db.get_all_reviews()?;
    let stats = stats_by_book(&reviews);
    let mut users = UserCache::new(db);

    let mut views = Vec::with_capacity(page.len());
    for book in page {
        let book_stats = stats.get(book.id.as_str()).copied().unwrap_or_default();
        let created_by = users.get(&book.created_by)?;
        views.push(BookView::new(book, created_by, book_stats));
    }

    Ok(BookListing {
        books: views,
        limit: filter.page.limit,
        page: filter.page.page,
        total_books,
        total_pages: filter.page.total_pages(total_books),
    })
}

/// A single book with its rating stats, or `None` if it does not exist.
pub fn book_detail(db: &Database, id: &str) -> Result<Option<BookView>, DatabaseError> {
    let Some(book) = db.get_book(id)? else {
        return Ok(None);
    };

    book_view(db, book).map(Some)
}

/// Attach creator and rating stats to a stored book.
pub fn book_view(db: &Database, book: Book) -> Result<BookView, DatabaseError> {
    let stats = RatingStats::from_ratings(
        db.get_reviews_by_book(&book.id)?
            .iter()
            .map(|r| r.rating),
    );
    let created_by = db.get_user(&book.created_by)?.as_ref().map(UserRef::from);
    Ok(BookView::new(book, created_by, stats))
}

/// Every review of one book, newest first, with the reviewer attached.
pub fn reviews_for_book(db: &Database, book_id: &str) -> Result<Vec<ReviewView>, DatabaseError> {
    let mut reviews = db.get_reviews_by_book(book_id)?;
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

    let mut users = UserCache::new(db);
    let mut views = Vec::with_capacity(reviews.len());
    for review in reviews {
        let user = users.get(&review.user_id)?;
        views.push(ReviewView::new(review, user, None));
    }
    Ok(views)
}

/// One page of reviews across all books, each with reviewer and book.
pub fn list_reviews(db: &Database, filter: &ReviewFilter) -> Result<ReviewListing, DatabaseError> {
    let mut reviews: Vec<Review> = db
        .get_all_reviews()?
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();
    reviews.sort_by(|a, b| filter.compare(a, b));

    let total_reviews = reviews.len();
    let page = filter.page.slice(reviews);

    let mut users = UserCache::new(db);
    let mut books: HashMap<String, Option<BookRef>> = HashMap::new();
    let mut views = Vec::with_capacity(page.len());
    for review in page {
        let user = users.get(&review.user_id)?;
        let book = match books.get(&review.book_id) {
            Some(found) => found.clone(),
            None => {
                let found = db.get_book(&review.book_id)?.as_ref().map(BookRef::from);
                books.insert(review.book_id.clone(), found.clone());
                found
            }
        };
        views.push(ReviewView::new(review, user, book));
    }

    Ok(ReviewListing {
        limit: filter.page.limit,
        page: filter.page.page,
        reviews: views,
        success: true,
        total_pages: filter.page.total_pages(total_reviews),
        total_reviews,
    })
}
