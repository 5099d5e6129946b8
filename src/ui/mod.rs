//! Terminal host surfaces.

pub mod console;
