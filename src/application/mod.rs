pub mod bootstrap;
pub mod categories;
pub mod commands;
pub mod journal;
pub mod mentor;
pub mod notifications;
pub mod session;
