pub mod api_features;
pub mod geo;
pub mod images;
pub mod jwt;
pub mod password;
pub mod response;
