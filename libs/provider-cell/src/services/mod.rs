pub mod compatibility;
pub mod load_balancing;

pub use compatibility::CompatibilityService;
pub use load_balancing::LoadBalancingService;
