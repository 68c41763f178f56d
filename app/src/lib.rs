//! ntfy menu-bar daemon: keeps one live stream per subscribed topic, stores
//! what arrives, raises notifications and serves a local control API for the
//! native shell.

pub mod app;
pub mod background;
pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod managed;
pub mod notification;
pub mod server;
pub mod services;
pub mod shutdown;

pub use bootstrap::{init_foundation, spawn_background_tasks, start_subscriptions};
