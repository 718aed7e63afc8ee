pub mod config;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod source;
pub mod web;
