#[cfg(test)]
#[macro_use]
mod test_macros;

pub mod config;
pub mod error;
pub mod guide;
pub mod layout;
pub mod models;
pub mod source;
pub mod tracing_ext;
