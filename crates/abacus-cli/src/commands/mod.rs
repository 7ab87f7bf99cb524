pub mod ability;
pub mod check;
pub mod validate;
