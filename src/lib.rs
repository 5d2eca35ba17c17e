pub mod analysis;
pub mod config;
pub mod context;
pub mod db;
pub mod llm;
pub mod util;
pub mod web;
