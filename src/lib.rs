pub mod auth;
pub mod bookings;
pub mod db;
pub mod email;
pub mod error;
pub mod identity;
pub mod models;
pub mod routes;
pub mod slots;
pub mod state;
