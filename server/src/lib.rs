//! Floortype operations server: notification endpoints, the admin password
//! gate and the dashboard/portal JSON routes.

pub mod config;
pub mod emails;
pub mod gate;
pub mod handlers;
pub mod http;
pub mod seed;
