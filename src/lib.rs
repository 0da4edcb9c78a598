#![doc = "The `taskhub` library crate."]
#![doc = ""]
#![doc = "This crate contains the domain models, authentication subsystem (password"]
#![doc = "hashing, session tokens, request gate), routing configuration, and error"]
#![doc = "handling for the TaskHub API. The main binary (`main.rs`) wires these"]
#![doc = "together into a running server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
