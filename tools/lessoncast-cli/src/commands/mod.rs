pub mod check;
pub mod demo;
pub mod layout;
pub mod validate;
