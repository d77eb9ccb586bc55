pub mod handler;
pub mod server;
pub mod startup;
#[cfg(test)]
mod testing;
