//! Inventory agent: periodic collection behind an HTTP API

pub mod api;
pub mod config;
pub mod service;
