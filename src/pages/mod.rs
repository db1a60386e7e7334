pub mod auth;
pub mod download;
pub mod landing;
pub mod login;
pub mod profile;
pub mod signup;
