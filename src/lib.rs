//! Asynchronous image-labeling pipeline with an identity-scoped catalog API.
//!
//! Uploads land in an object store under per-principal prefixes. A durable
//! queue decouples upload notifications from labeling capacity; worker
//! consumers fetch each image, invoke the external labeling function, render
//! a thumbnail, and record the result in the catalog. A synchronous API lets
//! each principal list and delete its own entries, and nothing else.

pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
