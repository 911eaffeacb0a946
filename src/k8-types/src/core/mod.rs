pub mod pod;
pub mod service;
