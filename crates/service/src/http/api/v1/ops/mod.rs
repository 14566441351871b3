pub mod delegate;
pub mod publication;
pub mod subscribe;
