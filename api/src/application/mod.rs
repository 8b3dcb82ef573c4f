pub mod error;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;
