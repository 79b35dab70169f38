pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;
pub mod workers;
