pub mod catalog;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod search;
pub mod service;
