//! Web server adapters

pub mod iis;

pub use iis::IisModule;
