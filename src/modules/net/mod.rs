//! Network configuration modules

pub mod firewall;

pub use firewall::FirewallModule;
