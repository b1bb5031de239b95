use std::io;
use std::path::PathBuf;

use valdore_common::error::{AuthError, BackendError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Usuario no autenticado")]
    Unauthenticated,
}

/// Input rejected before any network call. Messages are user-facing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Por favor completa todos los campos")]
    MissingFields,

    #[error("Por favor ingresa un correo electrónico válido")]
    InvalidEmail,

    #[error("La contraseña debe tener al menos 6 caracteres")]
    PasswordTooShort,

    #[error("El carrito está vacío")]
    EmptyCart,

    #[error("Selecciona una conversación")]
    NoConversationSelected,

    #[error("Este email no tiene permisos de administrador")]
    NotAdmin,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("local storage unavailable")]
    Unavailable,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed storage file: {0}")]
    Codec(#[from] serde_json::Error),
}
