//! Utility modules for oxdom.
//!
//! Contains the character classifier, the entity table, the pooled text
//! buffers, the string interning dictionary, and `QName` handling.

pub mod chars;
pub mod dict;
pub mod entities;
pub mod pool;
pub mod qname;
