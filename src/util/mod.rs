pub mod alphabet;
pub mod matrix;
