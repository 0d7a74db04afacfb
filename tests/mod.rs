mod common;

mod ntfy_tests;
mod store_tests;
