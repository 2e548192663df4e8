//! Business logic. Every function borrows a connection from the caller so routes and
//! tests can choose between a pooled connection and a test transaction.

pub mod cart;
pub mod catalog;
pub mod categories;
pub mod checkout;
pub mod comments;
pub mod dashboard;
pub mod orders;
pub mod users;
