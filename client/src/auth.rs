//! Customer sign-in/registration and the admin login + page guard.

use std::time::Duration;

use tracing::{info, warn};
use valdore_common::backend::Backend;
use valdore_common::error::AuthError;
use valdore_common::identity::AuthUser;

use crate::config::ClientConfig;
use crate::error::{ClientError, ValidationError};
use crate::storage::{SharedStorage, KEY_ADMIN_EMAIL, KEY_ADMIN_UID, KEY_IS_ADMIN};

pub const MIN_PASSWORD_LEN: usize = 6;

/// How often [`AdminGuard::watch`] re-checks the stored admin session.
pub const DEFAULT_GUARD_INTERVAL: Duration = Duration::from_secs(60);

/// Which form an auth error came from; each words failures differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    SignIn,
    Register,
    AdminLogin,
}

/// User-facing Spanish message for a provider error.
pub fn describe(flow: AuthFlow, error: &AuthError) -> String {
    match (flow, error) {
        (AuthFlow::SignIn | AuthFlow::AdminLogin, AuthError::UserNotFound) => {
            "Usuario no encontrado".to_string()
        }
        (AuthFlow::SignIn | AuthFlow::AdminLogin, AuthError::WrongPassword) => {
            "Contraseña incorrecta".to_string()
        }
        (AuthFlow::SignIn | AuthFlow::Register, AuthError::InvalidEmail) => {
            "Correo electrónico inválido".to_string()
        }
        (AuthFlow::AdminLogin, AuthError::InvalidEmail) => "Email inválido".to_string(),
        (AuthFlow::Register, AuthError::EmailAlreadyInUse) => {
            "Este correo ya está registrado".to_string()
        }
        (AuthFlow::Register, AuthError::WeakPassword) => "La contraseña es muy débil".to_string(),
        (AuthFlow::SignIn, other) => format!("Error al iniciar sesión: {other}"),
        (AuthFlow::Register, other) => format!("Error al crear cuenta: {other}"),
        (AuthFlow::AdminLogin, _) => "Error de acceso. Verifica tus credenciales".to_string(),
    }
}

/// Message for any error a login or registration form can produce.
pub fn user_message(flow: AuthFlow, error: &ClientError) -> String {
    match error {
        ClientError::Auth(e) => describe(flow, e),
        other => other.to_string(),
    }
}

pub async fn sign_in<B: Backend>(backend: &B, email: &str, password: &str) -> Result<AuthUser, ClientError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields.into());
    }
    let user = backend.sign_in(email, password).await?;
    info!(uid = %user.uid, "customer signed in");
    Ok(user)
}

pub async fn register<B: Backend>(
    backend: &B,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthUser, ClientError> {
    let (name, email) = (name.trim(), email.trim());
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields.into());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort.into());
    }
    let user = backend.sign_up(email, password, Some(name)).await?;
    info!(uid = %user.uid, "customer registered");
    Ok(user)
}

pub async fn sign_out<B: Backend>(backend: &B) -> Result<(), ClientError> {
    backend.sign_out().await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub email: String,
    pub uid: String,
}

/// Sign in to the back office. The email must be allow-listed both before
/// the provider call and on the account it returns; a signed-in account
/// that is not allow-listed is signed out again.
pub async fn admin_login<B: Backend>(
    backend: &B,
    storage: &SharedStorage,
    config: &ClientConfig,
    email: &str,
    password: &str,
) -> Result<AdminSession, ClientError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields.into());
    }
    if !config.is_admin_email(email) {
        return Err(ValidationError::NotAdmin.into());
    }

    let user = backend.sign_in(email, password).await?;
    if !config.is_admin_email(&user.email) {
        if let Err(e) = backend.sign_out().await {
            warn!("failed to sign out non-admin account: {e}");
        }
        return Err(ValidationError::NotAdmin.into());
    }

    storage.set_item(KEY_IS_ADMIN, "true")?;
    storage.set_item(KEY_ADMIN_EMAIL, &user.email)?;
    storage.set_item(KEY_ADMIN_UID, &user.uid)?;
    info!(email = %user.email, "admin signed in");
    Ok(AdminSession {
        email: user.email,
        uid: user.uid,
    })
}

/// Gate for back-office pages, driven by the keys [`admin_login`] stores.
pub struct AdminGuard {
    storage: SharedStorage,
    config: ClientConfig,
}

impl AdminGuard {
    pub fn new(storage: SharedStorage, config: ClientConfig) -> Self {
        Self { storage, config }
    }

    fn stored(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("cannot read {key} from local storage: {e}");
                None
            }
        }
    }

    /// Grant access, or clear the admin keys and deny it.
    pub fn check(&self) -> Option<AdminSession> {
        let is_admin = self.stored(KEY_IS_ADMIN);
        let email = self.stored(KEY_ADMIN_EMAIL);
        if is_admin.as_deref() == Some("true") {
            if let Some(email) = email.filter(|e| self.config.is_admin_email(e)) {
                return Some(AdminSession {
                    email,
                    uid: self.stored(KEY_ADMIN_UID).unwrap_or_default(),
                });
            }
        }
        warn!("admin session missing or not allowed");
        self.clear();
        None
    }

    pub fn logout(&self) {
        self.clear();
        info!("admin signed out");
    }

    fn clear(&self) {
        for key in [KEY_IS_ADMIN, KEY_ADMIN_EMAIL, KEY_ADMIN_UID] {
            if let Err(e) = self.storage.remove_item(key) {
                warn!("cannot clear {key}: {e}");
            }
        }
    }

    /// Re-check every `interval`; resolves once access is lost.
    pub async fn watch(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.check().is_none() {
                return;
            }
        }
    }
}
