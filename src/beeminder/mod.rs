pub mod client;
pub mod goal;

#[cfg(test)]
pub mod mock;
