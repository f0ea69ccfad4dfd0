pub mod keys;
pub mod simulate;
