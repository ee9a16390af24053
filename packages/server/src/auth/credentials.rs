use sea_orm::*;
use tracing::{debug, instrument};

use crate::auth::password;
use crate::entity::user;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} is already taken")]
    Conflict(&'static str),
    #[error("invalid name or password")]
    Unauthorized,
    #[error("user {0} not found")]
    NotFound(i32),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Registration input, validated before any side effect.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn validate_name(name: &str) -> Result<(), CredentialError> {
    if name.is_empty() || name.chars().count() > 32 {
        return Err(CredentialError::Validation("Name must be 1-32 characters".into()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CredentialError::Validation(
            "Name must contain only letters, digits, and underscores".into(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), CredentialError> {
    let invalid = || CredentialError::Validation("Email must look like local@domain".into());
    if email.len() > 254 {
        return Err(CredentialError::Validation(
            "Email must be at most 254 characters".into(),
        ));
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), CredentialError> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) {
        return Err(CredentialError::Validation(
            "Password must be 8-128 characters".into(),
        ));
    }
    Ok(())
}

/// Persists user identities and password hashes.
#[derive(Clone)]
pub struct CredentialStore {
    db: DatabaseConnection,
}

impl CredentialStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new_user), fields(name = %new_user.name))]
    pub async fn register(&self, new_user: NewUser) -> Result<user::Model, CredentialError> {
        let name = new_user.name.trim().to_string();
        let email = new_user.email.trim().to_string();
        validate_name(&name)?;
        validate_email(&email)?;
        validate_password(&new_user.password)?;

        let existing = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Name.eq(&name))
                    .add(user::Column::Email.eq(&email)),
            )
            .one(&self.db)
            .await?;
        if let Some(existing) = existing {
            return Err(CredentialError::Conflict(if existing.name == name {
                "Name"
            } else {
                "Email"
            }));
        }

        let hash = password::hash_password(&new_user.password)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;

        let model = user::ActiveModel {
            name: Set(name),
            email: Set(email),
            password_hash: Set(hash),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        model.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                debug!("Registration race condition: unique constraint caught on insert");
                CredentialError::Conflict("Name or email")
            }
            _ => CredentialError::from(e),
        })
    }

    /// Unknown names and wrong passwords are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn authenticate_by_name(
        &self,
        name: &str,
        password: &str,
    ) -> Result<user::Model, CredentialError> {
        let user = user::Entity::find()
            .filter(user::Column::Name.eq(name.trim()))
            .one(&self.db)
            .await?
            .ok_or(CredentialError::Unauthorized)?;

        let valid = password::verify_password(password, &user.password_hash)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        if !valid {
            return Err(CredentialError::Unauthorized);
        }
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<user::Model, CredentialError> {
        user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(CredentialError::NotFound(id))
    }
}
