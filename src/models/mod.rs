pub mod profile;
pub mod review;
pub mod session;
