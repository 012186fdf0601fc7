pub mod app;
pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod qrcodes;
pub mod state;
