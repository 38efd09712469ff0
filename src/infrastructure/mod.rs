pub mod auth_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod object_storage;
pub mod rest_store;
pub mod text_generation;
