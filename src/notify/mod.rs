pub mod category;
pub mod dispatcher;
pub mod routes;
pub mod store;
