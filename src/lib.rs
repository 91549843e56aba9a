#![allow(async_fn_in_trait)]

pub mod backend;
pub mod config;
pub mod export;
pub mod jobs;
pub mod lang;
pub mod search;
pub mod selection;

pub const USER_AGENT: &str = concat!("sift/", env!("CARGO_PKG_VERSION"));
