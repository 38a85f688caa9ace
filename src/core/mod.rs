pub mod app;
pub mod chat_stream;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod message;
pub mod session;
pub mod store;
pub mod user;
