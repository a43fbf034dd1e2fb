pub mod analysis;
pub mod subject;
