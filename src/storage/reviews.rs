use redb::ReadableTable;

use super::db::{decode, encode, Database, DatabaseError};
use super::models::Review;
use super::tables::*;

impl Database {
    // ========================================================================
    // Review operations
    // ========================================================================

    /// Insert a new review. Returns `false` without writing anything when
    /// the user already reviewed this book.
    pub fn create_review(&self, review: &Review) -> Result<bool, DatabaseError> {
        debug_assert!(!review.id.is_empty(), "review id must not be empty");
        debug_assert!((1..=5).contains(&review.rating));

        let write_txn = self.begin_write()?;
        {
            let owner_key = review.owner_key();
            let mut owners = write_txn.open_table(REVIEW_OWNERS)?;
            if owners.get(owner_key.as_str())?.is_some() {
                return Ok(false);
            }
            owners.insert(owner_key.as_str(), review.id.as_str())?;

            let mut table = write_txn.open_table(REVIEWS)?;
            let data = encode(review)?;
            table.insert(review.id.as_str(), data.as_slice())?;

            // Update book_reviews index
            let mut index_table = write_txn.open_table(BOOK_REVIEWS)?;
            let mut ids: Vec<String> = index_table
                .get(review.book_id.as_str())?
                .map(|v| decode(v.value()))
                .transpose()?
                .unwrap_or_default();

            if !ids.contains(&review.id) {
                ids.push(review.id.clone());
                let index_data = encode(&ids)?;
                index_table.insert(review.book_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Replace an existing review's content. Book and author never change.
    pub fn update_review(&self, review: &Review) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(REVIEWS)?;
            let data = encode(review)?;
            table.insert(review.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_review(&self, id: &str) -> Result<Option<Review>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(REVIEWS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Delete a review and its index entries
    pub fn delete_review(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let review: Option<Review> = {
            let mut table = write_txn.open_table(REVIEWS)?;
            let removed = table.remove(id)?;
            match removed {
                Some(data) => Some(decode(data.value())?),
                None => None,
            }
        };

        let deleted = match review {
            Some(review) => {
                {
                    let mut owners = write_txn.open_table(REVIEW_OWNERS)?;
                    owners.remove(review.owner_key().as_str())?;
                }

                let ids: Option<Vec<String>> = {
                    let index_table = write_txn.open_table(BOOK_REVIEWS)?;
                    let result = index_table.get(review.book_id.as_str())?;
                    match result {
                        Some(data) => Some(decode(data.value())?),
                        None => None,
                    }
                };

                if let Some(mut ids) = ids {
                    ids.retain(|v| v != id);
                    let mut index_table = write_txn.open_table(BOOK_REVIEWS)?;
                    if ids.is_empty() {
                        index_table.remove(review.book_id.as_str())?;
                    } else {
                        let new_index_data = encode(&ids)?;
                        index_table.insert(review.book_id.as_str(), new_index_data.as_slice())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// All reviews of one book, in insertion order
    pub fn get_reviews_by_book(&self, book_id: &str) -> Result<Vec<Review>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(BOOK_REVIEWS)?;
        let reviews_table = read_txn.open_table(REVIEWS)?;

        let ids: Vec<String> = match index_table.get(book_id)? {
            Some(data) => decode(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut reviews = Vec::new();
        for id in ids {
            if let Some(data) = reviews_table.get(id.as_str())? {
                reviews.push(decode(data.value())?);
            }
        }

        Ok(reviews)
    }

    pub fn get_all_reviews(&self) -> Result<Vec<Review>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(REVIEWS)?;

        let mut reviews = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            reviews.push(decode(value.value())?);
        }

        Ok(reviews)
    }
}
