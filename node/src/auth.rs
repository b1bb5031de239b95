//! Email/password accounts and bearer sessions.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use valdore_common::backend::new_document_id;
use valdore_common::error::AuthError;
use valdore_common::identity::AuthUser;
use valdore_common::validate::is_valid_email;

pub const MIN_PASSWORD_LEN: usize = 6;

const SALT_BYTES: usize = 16;
const SESSION_TOKEN_BYTES: usize = 32;

/// Sessions older than this many days are dropped.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user: AuthUser,
    salt: String,
    password_hash: String,
}

impl Account {
    fn new(user: AuthUser, password: &str) -> Self {
        let mut salt = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let password_hash = hash_password(&salt, password);
        Self {
            user,
            salt,
            password_hash,
        }
    }

    fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn new_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

struct Session {
    account: String,
    issued_at: DateTime<Utc>,
}

/// Account registry plus live sessions. Sessions are not persisted.
pub struct AuthService {
    accounts: DashMap<String, Account>,
    sessions: DashMap<String, Session>,
    session_ttl: Duration,
}

impl Default for AuthService {
    fn default() -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            session_ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }
}

impl AuthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        let service = Self::default();
        for account in accounts {
            service
                .accounts
                .insert(account_key(&account.user.email), account);
        }
        service
    }

    pub fn export(&self) -> Vec<Account> {
        self.accounts.iter().map(|e| e.value().clone()).collect()
    }

    /// Register an account and open a session for it.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<(String, AuthUser), AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let key = account_key(email);
        let user = match self.accounts.entry(key.clone()) {
            Entry::Occupied(_) => return Err(AuthError::EmailAlreadyInUse),
            Entry::Vacant(slot) => {
                let user = AuthUser {
                    uid: new_document_id(),
                    email: email.to_string(),
                    display_name: display_name
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                };
                slot.insert(Account::new(user.clone(), password));
                user
            }
        };

        info!(uid = %user.uid, "account created");
        Ok((self.open_session(&key), user))
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<(String, AuthUser), AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        let key = account_key(email);
        let user = {
            let account = self.accounts.get(&key).ok_or(AuthError::UserNotFound)?;
            if !account.verify(password) {
                return Err(AuthError::WrongPassword);
            }
            account.user.clone()
        };
        debug!(uid = %user.uid, "signed in");
        Ok((self.open_session(&key), user))
    }

    /// End a session. Returns false for an unknown token.
    pub fn sign_out(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn user_for(&self, token: &str) -> Option<AuthUser> {
        let key = {
            let session = self.sessions.get(token)?;
            if self.expired(&session, Utc::now()) {
                None
            } else {
                Some(session.account.clone())
            }
        };
        match key {
            Some(key) => self.accounts.get(&key).map(|a| a.user.clone()),
            None => {
                self.sessions.remove(token);
                None
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.issued_at >= self.session_ttl
    }

    fn open_session(&self, key: &str) -> String {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.expired(session, now));
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            debug!(pruned, "expired sessions dropped");
        }

        let token = new_session_token();
        self.sessions.insert(
            token.clone(),
            Session {
                account: key.to_string(),
                issued_at: now,
            },
        );
        token
    }
}
