pub mod issuance_routes;
pub mod model_routes;
pub mod search_routes;
