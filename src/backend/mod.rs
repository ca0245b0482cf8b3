//! Backend of the application.

pub mod launcher;
pub mod utils;
