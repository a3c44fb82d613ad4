pub mod account;
pub mod documents;
pub mod forum;
pub mod maintenance;
