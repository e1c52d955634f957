use chrono::Utc;
use redb::ReadableTable;

use super::db::{decode, encode, Database, DatabaseError};
use super::models::User;
use super::tables::*;

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Insert a new user. Returns `false` without writing anything when the
    /// email is already registered.
    pub fn create_user(&self, user: &User) -> Result<bool, DatabaseError> {
        debug_assert!(!user.id.is_empty(), "user id must not be empty");
        debug_assert_eq!(user.email, user.email.to_lowercase());

        let write_txn = self.begin_write()?;
        {
            let mut emails = write_txn.open_table(USER_EMAILS)?;
            if emails.get(user.email.as_str())?.is_some() {
                return Ok(false);
            }
            emails.insert(user.email.as_str(), user.id.as_str())?;

            let mut table = write_txn.open_table(USERS)?;
            let data = encode(user)?;
            table.insert(user.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let emails = read_txn.open_table(USER_EMAILS)?;
        let users = read_txn.open_table(USERS)?;

        let id = match emails.get(email)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        match users.get(id.as_str())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Change a user's display name. Returns the updated user, or `None`
    /// if no such user exists.
    pub fn update_user_name(&self, id: &str, name: &str) -> Result<Option<User>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(USERS)?;
            let existing: Option<User> = match table.get(id)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };

            match existing {
                Some(mut user) => {
                    user.name = name.to_string();
                    user.updated_at = Utc::now();
                    let data = encode(&user)?;
                    table.insert(id, data.as_slice())?;
                    Some(user)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }
}
