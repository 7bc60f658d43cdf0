pub mod dummy;
pub mod vm;
