//! Sitecraft - marketing site and admin CMS backend
//!
//! Serves the public site data (blog posts, service catalog, contact form,
//! page view tracking) and the admin API, with AI-assisted copy and image
//! generation on top.

pub mod ai;
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
