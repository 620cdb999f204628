pub mod config;
pub mod output;
pub mod scan;

mod test_utils;
