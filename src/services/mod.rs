pub mod booking_service;
pub mod email;
pub mod payment;
pub mod review_service;
pub mod tour_service;
pub mod user_service;
