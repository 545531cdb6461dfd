mod routes;

pub use routes::{DueQuery, routes};
