use tracing::warn;
use uuid::Uuid;

use super::{
    middleware::Identity,
    repo::{UserStore, EMAIL_CONSTRAINT, PHONE_CONSTRAINT},
};
use crate::error::{ApiError, StoreError, UniqueField};

/// Allows the call only when `owner` is the authenticated subject.
pub fn ensure_owner(owner: Uuid, identity: &Identity, message: &str) -> Result<(), ApiError> {
    if owner != identity.user_id {
        warn!(subject = %identity.user_id, %owner, "ownership check failed");
        return Err(ApiError::forbidden(message));
    }
    Ok(())
}

pub fn ensure_admin(identity: &Identity, message: &str) -> Result<(), ApiError> {
    if !identity.is_admin() {
        warn!(subject = %identity.user_id, "admin role required");
        return Err(ApiError::forbidden(message));
    }
    Ok(())
}

/// Friendly pre-check before signup; phone is checked first. Racing signups
/// are still stopped by the storage constraints, see `conflict_from_store`.
pub async fn ensure_identifiers_available(
    users: &dyn UserStore,
    phone: &str,
    email: &str,
) -> Result<(), ApiError> {
    if users.find_by_phone(phone).await?.is_some() {
        warn!(%phone, "phone already registered");
        return Err(ApiError::IdentifierTaken(UniqueField::Phone));
    }
    if users.find_by_email(email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::IdentifierTaken(UniqueField::Email));
    }
    Ok(())
}

pub fn unique_field_for(constraint: &str) -> Option<UniqueField> {
    match constraint {
        PHONE_CONSTRAINT => Some(UniqueField::Phone),
        EMAIL_CONSTRAINT => Some(UniqueField::Email),
        c if c.contains("phone") => Some(UniqueField::Phone),
        c if c.contains("email") => Some(UniqueField::Email),
        _ => None,
    }
}

/// Translates a unique violation on the users table into the signup codes.
pub fn conflict_from_store(err: StoreError) -> ApiError {
    if let StoreError::Duplicate { constraint } = &err {
        if let Some(field) = unique_field_for(constraint) {
            warn!(%constraint, "signup lost a uniqueness race");
            return ApiError::IdentifierTaken(field);
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        claims::Role,
        repo::{MemoryUserStore, NewUser},
    };
    use axum::http::StatusCode;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn owner_passes_and_stranger_is_forbidden() {
        let me = identity(Role::User);
        assert!(ensure_owner(me.user_id, &me, "Not authorized").is_ok());

        let err = ensure_owner(Uuid::new_v4(), &me, "Not authorized").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Not authorized");
    }

    #[test]
    fn admin_owns_nothing_it_did_not_create() {
        let admin = identity(Role::Admin);
        let err = ensure_owner(Uuid::new_v4(), &admin, "Not authorized").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn admin_check() {
        assert!(ensure_admin(&identity(Role::Admin), "nope").is_ok());
        let err = ensure_admin(&identity(Role::User), "nope").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn precheck_reports_phone_before_email() {
        let store = MemoryUserStore::default();
        store
            .create(NewUser {
                name: "Jane Doe",
                phone: "12345678901",
                email: "jane@example.com",
                password_hash: "x",
                role: Role::User,
            })
            .await
            .unwrap();

        let err = ensure_identifiers_available(&store, "12345678901", "jane@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::IdentifierTaken(UniqueField::Phone)));

        let err = ensure_identifiers_available(&store, "10987654321", "jane@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::IdentifierTaken(UniqueField::Email)));

        assert!(
            ensure_identifiers_available(&store, "10987654321", "john@example.com")
                .await
                .is_ok()
        );
    }

    #[test]
    fn constraint_violations_map_to_signup_codes() {
        let phone = conflict_from_store(StoreError::Duplicate {
            constraint: PHONE_CONSTRAINT.into(),
        });
        assert!(matches!(phone, ApiError::IdentifierTaken(UniqueField::Phone)));

        let email = conflict_from_store(StoreError::Duplicate {
            constraint: EMAIL_CONSTRAINT.into(),
        });
        assert!(matches!(email, ApiError::IdentifierTaken(UniqueField::Email)));

        let other = conflict_from_store(StoreError::Duplicate {
            constraint: "users_pkey".into(),
        });
        assert_eq!(other.status(), StatusCode::BAD_REQUEST);
        assert!(!matches!(other, ApiError::IdentifierTaken(_)));
    }
}
