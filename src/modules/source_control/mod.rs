//! Source control operations module

pub mod svn;

pub use svn::SvnModule;
