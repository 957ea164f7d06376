pub mod api;
pub mod client;
pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod export;
pub mod filesystem;
pub mod links;
pub mod paginate;

#[cfg(test)]
mod testing;
