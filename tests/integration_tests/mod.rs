#![cfg(unix)]

pub mod backup;
pub mod cli;
pub mod locate;
pub mod predict;
pub mod topology;
