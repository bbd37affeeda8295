use crate::errors::{StoreError, StoreResult};
use crate::model::{LoginOutcome, RegisterOutcome, User};
use crate::storage::store::Store;
use rusqlite::{params, OptionalExtension};

pub const LOGIN_FAILED_MESSAGE: &str = "Invalid name or birthdate. Please try again or register.";
pub const DUPLICATE_ACCOUNT_MESSAGE: &str =
    "An account with this name and birthdate already exists. Please login instead.";
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Please enter your name and birthdate.";

fn row_to_user(r: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        username: r.get(1)?,
        birthdate: r.get(2)?,
        created_at: r.get(3)?,
    })
}

impl Store {
    /// Creates an account. Duplicates and blank credentials come back as
    /// `RegisterOutcome::Failure`, not as errors.
    pub fn register(&self, name: &str, birthdate: &str) -> StoreResult<RegisterOutcome> {
        let (name, birthdate) = (name.trim(), birthdate.trim());
        if name.is_empty() || birthdate.is_empty() {
            return Ok(RegisterOutcome::Failure {
                message: MISSING_CREDENTIALS_MESSAGE.to_string(),
            });
        }

        let conn = self.lock()?;
        let inserted = {
            let mut stmt =
                self.prepare(&conn, "INSERT INTO users (username, birthdate) VALUES (?1, ?2)")?;
            stmt.execute(params![name, birthdate])
        };

        match inserted.map_err(StoreError::from) {
            Ok(_) => {
                let user_id = conn.last_insert_rowid();
                tracing::info!(event = "user_registered", user_id);
                Ok(RegisterOutcome::Success { user_id })
            }
            Err(e) if e.is_constraint_violation() => {
                tracing::debug!(event = "user_register_duplicate");
                Ok(RegisterOutcome::Failure {
                    message: DUPLICATE_ACCOUNT_MESSAGE.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn login(&self, name: &str, birthdate: &str) -> StoreResult<LoginOutcome> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT id, username, birthdate, created_at FROM users
             WHERE username = ?1 AND birthdate = ?2",
        )?;
        let user = stmt
            .query_row(params![name.trim(), birthdate.trim()], row_to_user)
            .optional()?;

        Ok(match user {
            Some(user) => LoginOutcome::Success { user },
            None => LoginOutcome::Failure {
                message: LOGIN_FAILED_MESSAGE.to_string(),
            },
        })
    }

    pub fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT id, username, birthdate, created_at FROM users WHERE id = ?1",
        )?;
        Ok(stmt.query_row([user_id], row_to_user).optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        let store = Store::memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_register_then_login() {
        let store = store();
        let RegisterOutcome::Success { user_id } = store.register("Mia", "2017-03-02").unwrap()
        else {
            panic!("expected success");
        };

        match store.login("Mia", "2017-03-02").unwrap() {
            LoginOutcome::Success { user } => {
                assert_eq!(user.id, user_id);
                assert_eq!(user.username, "Mia");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            store.login("Mia", "2017-03-03").unwrap(),
            LoginOutcome::Failure {
                message: LOGIN_FAILED_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_register_is_a_failure_outcome() {
        let store = store();
        store.register("Leo", "2016-01-01").unwrap();
        assert_eq!(
            store.register("Leo", "2016-01-01").unwrap(),
            RegisterOutcome::Failure {
                message: DUPLICATE_ACCOUNT_MESSAGE.to_string()
            }
        );
        // Same name, different birthdate is a different child.
        assert!(matches!(
            store.register("Leo", "2016-01-02").unwrap(),
            RegisterOutcome::Success { .. }
        ));
    }

    #[test]
    fn test_blank_credentials_rejected() {
        let store = store();
        assert_eq!(
            store.register("  ", "2016-01-01").unwrap(),
            RegisterOutcome::Failure {
                message: MISSING_CREDENTIALS_MESSAGE.to_string()
            }
        );
        assert_eq!(store.count_rows("users").unwrap(), 0);
    }

    #[test]
    fn test_get_user_missing() {
        let store = store();
        assert_eq!(store.get_user(99).unwrap(), None);
    }
}
