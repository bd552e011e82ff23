pub mod collector;
pub mod provider;
pub mod yahoo;
