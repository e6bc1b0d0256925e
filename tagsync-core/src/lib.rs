mod auth;
mod client;

pub use auth::{AuthClient, AuthError, SessionToken};
pub use client::{
    ApiErrorClass, FileList, Resource, ResourceType, VaultClient, VaultError,
};
