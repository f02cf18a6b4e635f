pub mod csrf;
pub mod origin;
