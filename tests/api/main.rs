//! HTTP and database integration tests.
//!
//! Database tests run inside a transaction that is never committed and are skipped
//! unless `TEST_DATABASE_URL` points at a disposable PostgreSQL database.

mod cart;
mod catalog;
mod checkout;
mod common;
mod orders;
mod router;
