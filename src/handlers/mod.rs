//! HTTP handlers: generic entity endpoints, user presets, sign-in.

pub mod auth;
pub mod entity;
pub mod params;
pub mod user;
