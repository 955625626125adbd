//! Runnable modules containing each bundling multiple services and providing a unified configuration

pub mod options;

pub mod gateway;
pub mod peer;
pub mod probe;
pub mod standalone;
pub mod users;
