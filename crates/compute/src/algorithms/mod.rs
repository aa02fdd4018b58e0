pub mod amplitude;
pub mod hierarchy;
pub mod scanner;
