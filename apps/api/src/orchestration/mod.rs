pub mod aggregate;
pub mod context_manager;
pub mod coordinator;
pub mod evidence;
pub mod handlers;
pub mod isolation;
pub mod storage;
pub mod types;
pub mod unit;

#[cfg(test)]
pub mod testing;
