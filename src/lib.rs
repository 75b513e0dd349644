mod id;

pub mod event;
pub mod group;
pub mod integration;
pub mod message;
pub mod schema;
pub mod state;
pub mod thread;
pub mod user;
