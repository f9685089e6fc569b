pub mod common;
pub mod postgres_test;
pub mod telegram_test;
