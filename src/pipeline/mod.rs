pub mod controller;
#[cfg(test)]
pub(crate) mod testing;
pub mod worker;
