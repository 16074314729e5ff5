//! Data structures describing stream components.
//!
//! Frame headers, the optional Xing VBR tag carried by the first frame, and
//! the frame index used for seeking.

pub mod header;
pub mod index;
pub mod xing;
