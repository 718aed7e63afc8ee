pub mod activities;
pub mod auth;
pub mod health;
pub mod points;
pub mod registrations;
pub mod users;
