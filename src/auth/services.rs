use tracing::{info, warn};

use super::{
    claims::Role,
    guard::{conflict_from_store, ensure_identifiers_available},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{NewUser, User, UserStore},
    validation::ValidSignup,
};
use crate::error::{ApiError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Phone or Email is incorrect")]
    IdentifierNotFound,
    #[error("Password is incorrect")]
    PasswordIncorrect,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::IdentifierNotFound | CredentialError::PasswordIncorrect => {
                ApiError::bad_request(err.to_string())
            }
            CredentialError::Store(e) => e.into(),
            CredentialError::Internal(e) => ApiError::Internal(e),
        }
    }
}

/// Resolves `identifier` by exact phone or email match and checks the password.
pub async fn verify_credentials(
    users: &dyn UserStore,
    identifier: &str,
    password: &str,
) -> Result<User, CredentialError> {
    let user = users
        .find_by_identifier(identifier)
        .await?
        .ok_or(CredentialError::IdentifierNotFound)?;

    if !verify_password(password, &user.password_hash).map_err(anyhow::Error::from)? {
        return Err(CredentialError::PasswordIncorrect);
    }
    Ok(user)
}

/// Verifies credentials and issues a token bound to the user's id and role.
pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    identifier: &str,
    password: &str,
) -> Result<String, CredentialError> {
    let user = match verify_credentials(users, identifier, password).await {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "login rejected");
            return Err(e);
        }
    };
    let token = keys.issue(user.id, user.role)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Creates a user after the uniqueness pre-check. A collision that slips past
/// the pre-check is caught by the storage constraint and mapped to the same code.
pub async fn signup(users: &dyn UserStore, input: ValidSignup) -> Result<User, ApiError> {
    ensure_identifiers_available(users, &input.phone, &input.email).await?;

    let hash = hash_password(&input.password).map_err(anyhow::Error::from)?;
    let user = users
        .create(NewUser {
            name: &input.name,
            phone: &input.phone,
            email: &input.email,
            password_hash: &hash,
            role: Role::User,
        })
        .await
        .map_err(conflict_from_store)?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}
