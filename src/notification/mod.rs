pub mod registry;
pub mod signature;
pub mod webhook;
