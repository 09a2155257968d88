pub mod discount;
pub mod distributor;
pub mod edit;
pub mod quote;
pub mod summary;
