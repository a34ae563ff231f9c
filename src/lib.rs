pub mod cleanup;
pub mod config;
pub mod develop;
pub mod dist;
pub mod environ;
pub mod install;
pub mod runtime;
pub mod scripts;
pub mod workset;
