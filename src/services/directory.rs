use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::user::{Contact, ContactKind, User};
use crate::error::ApiError;
use crate::infra::store::{Store, UserDirectoryStore, USERS_EMAIL_KEY, USERS_PHONE_KEY};
use crate::security::password;

/// Registration input as submitted by the sign-up form.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn Store>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(has_email = input.email.is_some(), has_phone = input.phone.is_some()))]
    pub async fn register(&self, input: NewUser) -> Result<User, ApiError> {
        let name = clean(input.name).ok_or_else(|| ApiError::Validation("Name is required".into()))?;
        let email = clean(input.email);
        let phone = clean(input.phone);
        if email.is_none() && phone.is_none() {
            return Err(ApiError::Validation(
                "Email or phone number is required".into(),
            ));
        }
        if input.password.is_empty() {
            return Err(ApiError::Validation("Password is required".into()));
        }
        if input.password != input.confirm_password {
            return Err(ApiError::Validation("Passwords do not match!".into()));
        }

        if let Some(email) = &email {
            if self.store.find_user_by_email(email).await?.is_some() {
                return Err(ApiError::DuplicateContact(ContactKind::Email));
            }
        }
        if let Some(phone) = &phone {
            if self.store.find_user_by_phone(phone).await?.is_some() {
                return Err(ApiError::DuplicateContact(ContactKind::Phone));
            }
        }

        let password_hash = password::hash_password(&input.password)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            phone,
            password_hash,
            created_at: OffsetDateTime::now_utc(),
            bookings: Vec::new(),
        };

        // A concurrent registration can slip past the lookups above; the unique keys catch it.
        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(e) if e.is_conflict_on(USERS_EMAIL_KEY) => {
                return Err(ApiError::DuplicateContact(ContactKind::Email))
            }
            Err(e) if e.is_conflict_on(USERS_PHONE_KEY) => {
                return Err(ApiError::DuplicateContact(ContactKind::Phone))
            }
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    #[tracing::instrument(skip(self, contact, password), fields(kind = ?contact.kind()))]
    pub async fn authenticate(&self, contact: &Contact, password: &str) -> Result<User, ApiError> {
        let found = match contact {
            Contact::Email(email) => self.store.find_user_by_email(email).await?,
            Contact::Phone(phone) => self.store.find_user_by_phone(phone).await?,
        };
        let Some(user) = found else {
            password::verify_unknown_account(password);
            return Err(ApiError::InvalidCredentials);
        };

        match password::verify_password(password, &user.password_hash) {
            Ok(true) => Ok(user),
            Ok(false) => Err(ApiError::InvalidCredentials),
            Err(e) => {
                warn!(user_id = %user.id, "stored password hash unreadable: {e}");
                Err(ApiError::InvalidCredentials)
            }
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<User, ApiError> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("User"))
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
