pub mod assertion;
pub mod balance;
pub mod payload;
pub mod proof;
pub mod store;
