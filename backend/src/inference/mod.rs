pub mod model;
pub mod network;
pub mod preprocess;
pub mod routes;
