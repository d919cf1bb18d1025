pub mod app;
pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
