pub mod command;
pub mod decode;
pub mod index;
pub mod info;
