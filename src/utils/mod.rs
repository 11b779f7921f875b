//! Utility modules for the site builder.

pub mod category;
pub mod exec;
pub mod minify;
pub mod slug;
