// Library for tests to access modules

pub mod command;
pub mod config;
pub mod interface_repo;
pub mod ip_repo;
pub mod models;
pub mod monitor;
pub mod rate;
pub mod reconnect;
pub mod routes;
pub mod side_channel;
pub mod traffic_repo;
pub mod version;
