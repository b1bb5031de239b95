pub mod backend;
pub mod chat;
pub mod contact;
pub mod currency;
pub mod error;
pub mod identity;
pub mod message;
pub mod order;
pub mod protocol;
pub mod validate;
