pub mod index;
pub mod publish;
