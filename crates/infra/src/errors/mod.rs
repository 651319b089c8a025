//! Error conversions at the infrastructure boundary

mod conversions;
