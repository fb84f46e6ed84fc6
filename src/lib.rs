#![forbid(unsafe_code)]

//! Tubely media tooling.
//!
//! Two independent pieces live here: the authenticated thumbnail upload flow
//! (`upload`, backed by `auth`, `storage` and `metadata`) and the
//! ffprobe-based aspect-ratio classifier (`probe`, `aspect`). The `api`
//! module wires the upload flow into an axum router for the backend binary.

pub mod api;
pub mod aspect;
pub mod auth;
pub mod config;
pub mod metadata;
pub mod probe;
pub mod storage;
pub mod upload;
