//! Storefront and back-office logic for the Valdore coffee shop.
//!
//! Every page is a headless view-model that owns its backend and storage
//! handles and exposes a `view()` recomputed from state. The backend is any
//! [`valdore_common::backend::Backend`]: in-process (`valdore-node`) or
//! [`remote::RemoteBackend`].

pub mod auth;
pub mod cart;
pub mod config;
pub mod console;
pub mod contact;
pub mod conversations;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod identity;
pub mod orders;
pub mod remote;
pub mod storage;
pub mod widget;

pub use error::{ClientError, StorageError, ValidationError};
