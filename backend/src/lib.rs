pub mod db;
pub mod sequence;
pub mod server;
pub mod version;
pub mod web;
