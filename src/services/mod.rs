pub mod activities_service;
pub mod list_view;
pub mod points_service;
pub mod refresh;
pub mod registrations_service;
pub mod users_service;
