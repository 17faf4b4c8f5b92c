// Library exports for CivicTrack
// This allows integration tests and external code to use CivicTrack modules

pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod geo;
pub mod issues;
pub mod routes;
pub mod state;
