use uuid::Uuid;

use super::email::Email;
use crate::auth::password::Passwords;
use crate::error::UserError;

/// Identity record. `id` is assigned once at registration and never changes;
/// the password is only ever held as an Argon2 hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: Email,
    pub name: String,
    pub surname: String,
    pub is_recruiter: bool,
    pub(crate) password_hash: String,
}

impl User {
    /// Builds a brand new user: fresh id, trimmed names, password hashed once.
    pub fn register(
        email: Email,
        name: &str,
        surname: &str,
        password: &str,
        is_recruiter: bool,
        passwords: &Passwords,
    ) -> Result<Self, UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        let password = password.trim();
        if password.is_empty() {
            return Err(UserError::EmptyPassword);
        }
        let password_hash = passwords.hash(password)?;

        Ok(Self {
            id: Uuid::new_v4(),
            email,
            name: name.to_string(),
            surname: surname.trim().to_string(),
            is_recruiter,
            password_hash,
        })
    }

    /// Rehydrates a record read back from the store or the cache.
    pub fn from_parts(
        id: Uuid,
        email: Email,
        name: String,
        surname: String,
        is_recruiter: bool,
        password_hash: String,
    ) -> Self {
        Self {
            id,
            email,
            name,
            surname,
            is_recruiter,
            password_hash,
        }
    }

    pub fn check_password(&self, plain: &str, passwords: &Passwords) -> bool {
        passwords.verify(plain, &self.password_hash)
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}
