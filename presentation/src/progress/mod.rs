//! Progress reporting for a running council session.

pub mod reporter;
