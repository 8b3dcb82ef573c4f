pub mod entry;
pub mod name;
pub mod tree;
