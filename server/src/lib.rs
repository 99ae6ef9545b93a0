//! Authoritative combat core for the skirmish server.

pub mod commands;
pub mod config;
pub mod entities;
pub mod replication;
pub mod world;
