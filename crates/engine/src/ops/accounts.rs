//! Sign-up and log-in.
//!
//! Passwords are stored as argon2 PHC strings. Both operations return a
//! freshly issued credential.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, SqlErr, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, FieldError, Identity, ResultEngine, users};

use super::{Engine, with_tx};

const MIN_NAME_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 8;

/// Verified against when the email is unknown, so log-in does the same work
/// whether or not the account exists.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("unknown-account-0!").ok());

/// A registered user, without credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// An account together with a credential for it.
#[derive(Clone, Debug)]
pub struct Session {
    pub account: Account,
    pub token: String,
}

impl Engine {
    /// Register a new user and issue a credential.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> ResultEngine<Session> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let account = with_tx!(self, |db_tx| {
            let existing = users::Entity::find()
                .filter(users::Column::Email.eq(email.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(email));
            }

            let account = Account {
                id: Uuid::new_v4(),
                name,
                email,
            };
            users::ActiveModel {
                id: ActiveValue::Set(account.id.to_string()),
                name: ActiveValue::Set(account.name.clone()),
                email: ActiveValue::Set(account.email.clone()),
                password_hash: ActiveValue::Set(password_hash),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await
            .map_err(|err| existing_on_unique(err, &account.email))?;
            ResultEngine::Ok(account)
        })?;

        tracing::info!(user = %account.id, "registered user");
        self.session(account)
    }

    /// Check an email/password pair and issue a credential.
    ///
    /// Unknown email and wrong password are the same error.
    pub async fn log_in(&self, email: &str, password: &str) -> ResultEngine<Session> {
        let email = email.trim().to_lowercase();
        let Some(user) = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.database)
            .await?
        else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(EngineError::Unauthenticated);
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(EngineError::Unauthenticated);
        }

        let account = Account {
            id: Uuid::parse_str(&user.id)
                .map_err(|_| EngineError::Credential("invalid stored user id".to_string()))?,
            name: user.name,
            email: user.email,
        };
        self.session(account)
    }

    /// Resolve a bearer credential into the caller's identity.
    pub fn authenticate(&self, token: &str) -> ResultEngine<Identity> {
        use crate::CredentialVerifier;

        self.gate.verify(token)
    }

    fn session(&self, account: Account) -> ResultEngine<Session> {
        let token = self.gate.issue(&Identity::new(account.id))?;
        Ok(Session { account, token })
    }
}

fn validate_name(name: &str) -> ResultEngine<String> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(FieldError::new(
            "name",
            format!("must be at least {MIN_NAME_LEN} characters"),
        )
        .into());
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> ResultEngine<String> {
    let email = email.trim().to_lowercase();
    let invalid = || EngineError::from(FieldError::new("email", "invalid email format"));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let domain_ok = domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.')
        && !domain.contains('@');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(email)
}

fn validate_password(password: &str) -> ResultEngine<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FieldError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        )
        .into());
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if !(has_letter && has_digit && has_special) {
        return Err(FieldError::new(
            "password",
            "must contain a letter, a number and a special character",
        )
        .into());
    }
    Ok(())
}

/// A concurrent sign-up can pass the lookup and still lose the insert to the
/// unique email index.
fn existing_on_unique(err: DbErr, email: &str) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::ExistingKey(email.to_string()),
        _ => err.into(),
    }
}

fn hash_password(password: &str) -> ResultEngine<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EngineError::Credential(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, hash: &str) -> ResultEngine<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| EngineError::Credential(format!("invalid stored password hash: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
