//! Demo web service reporting host information, and the declaration of the
//! Fargate stack that runs it.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod stack;
