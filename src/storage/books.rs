use redb::ReadableTable;

use super::db::{decode, encode, Database, DatabaseError};
use super::models::{Book, CascadeOutcome, Review};
use super::tables::*;

impl Database {
    // ========================================================================
    // Book operations
    // ========================================================================

    /// Insert or replace a book
    pub fn put_book(&self, book: &Book) -> Result<(), DatabaseError> {
        debug_assert!(!book.id.is_empty(), "book id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(BOOKS)?;
            let data = encode(book)?;
            table.insert(book.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_book(&self, id: &str) -> Result<Option<Book>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(BOOKS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_all_books(&self) -> Result<Vec<Book>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(BOOKS)?;

        let mut books = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            books.push(decode(value.value())?);
        }

        Ok(books)
    }

    /// Delete a book and every review that references it in one
    /// transaction. Returns `None` if the book does not exist.
    pub fn delete_book_cascade(&self, id: &str) -> Result<Option<CascadeOutcome>, DatabaseError> {
        self.delete_book_cascade_with(id, |_| Ok(()))
    }

    /// As [`Database::delete_book_cascade`], running `before_book_delete`
    /// after the reviews are removed and before the book is. An error from
    /// the hook aborts the whole transaction.
    pub fn delete_book_cascade_with<F>(
        &self,
        id: &str,
        before_book_delete: F,
    ) -> Result<Option<CascadeOutcome>, DatabaseError>
    where
        F: FnOnce(usize) -> Result<(), DatabaseError>,
    {
        let write_txn = self.begin_write()?;

        let book: Book = {
            let table = write_txn.open_table(BOOKS)?;
            let result = table.get(id)?;
            match result {
                Some(data) => decode(data.value())?,
                None => return Ok(None),
            }
        };

        // Remove the book's review index entry, then each review and its
        // ownership key
        let review_ids: Vec<String> = {
            let mut index_table = write_txn.open_table(BOOK_REVIEWS)?;
            let removed = index_table.remove(id)?;
            match removed {
                Some(data) => decode(data.value())?,
                None => Vec::new(),
            }
        };

        let mut deleted_reviews = 0;
        {
            let mut reviews = write_txn.open_table(REVIEWS)?;
            let mut owners = write_txn.open_table(REVIEW_OWNERS)?;
            for review_id in &review_ids {
                let removed: Option<Review> = match reviews.remove(review_id.as_str())? {
                    Some(data) => Some(decode(data.value())?),
                    None => None,
                };
                if let Some(review) = removed {
                    owners.remove(review.owner_key().as_str())?;
                    deleted_reviews += 1;
                }
            }
        }

        tracing::debug!(book_id = %id, deleted_reviews, "Deleted reviews for book");
        before_book_delete(deleted_reviews)?;

        {
            let mut table = write_txn.open_table(BOOKS)?;
            table.remove(id)?;
        }

        write_txn.commit()?;
        Ok(Some(CascadeOutcome {
            book,
            deleted_reviews,
        }))
    }
}
