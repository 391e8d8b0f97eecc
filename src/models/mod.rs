pub mod dashboard;
pub mod k8s;
pub mod metrics;
pub mod restart;
