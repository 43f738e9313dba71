//! Wire types shared by the lanchat gateway, its HTTP surface and clients.

pub mod api;
pub mod events;
pub mod models;
