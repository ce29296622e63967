//! Pure clinical rules shared by the services: shift windows, dosing
//! arithmetic and value parsing.

pub mod data;
pub mod dosing;
pub mod shift;
