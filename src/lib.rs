#![forbid(unsafe_code)]

pub mod browser;
pub mod cli;
pub mod config;
pub mod download;
pub mod extract;
pub mod formats;
pub mod locate;
pub mod logging;
pub mod pacing;
pub mod scripts;
pub mod search;
pub mod sink;
pub mod title;
pub mod traverse;
pub mod visit;
