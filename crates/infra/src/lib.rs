pub mod db;
pub mod memory;
pub mod models;
pub mod money;
pub mod repos;
pub mod store;

pub use money::Money;
