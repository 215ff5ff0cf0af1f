//! Piazza: a small community blogging service.
//!
//! Users publish posts, optionally filed into named groups and illustrated
//! with an image attachment; everyone else browses paginated listings and
//! leaves comments. The home-page listing sits behind a single-entry TTL
//! cache; group and profile listings are always read fresh.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
