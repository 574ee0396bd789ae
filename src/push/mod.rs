pub mod registry;
pub mod routes;
pub mod transport;
