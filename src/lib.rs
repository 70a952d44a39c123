//! netcheck - network connectivity specs for KubeVirt virtual machine instances

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod network;
pub mod output;
pub mod reporter;
pub mod resources;
pub mod suite;
pub mod wait;
