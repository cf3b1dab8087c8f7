pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod event;
pub mod run;
pub mod sink;
pub mod upstream;
