//! Operating system service modules

pub mod service;

pub use service::WindowsServiceModule;
