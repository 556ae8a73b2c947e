pub mod authorize;
pub mod credits;
pub mod payment;
pub mod router;
