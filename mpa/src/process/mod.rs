pub mod decode;
pub mod reader;
pub mod scan;
pub mod session;
