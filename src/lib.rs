pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod crypto;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod invoices;
