//! Kubernetes resources manipulated by the network specs

pub mod traits;
pub mod vmi;
pub mod service;
pub mod job;

pub use traits::*;
pub use vmi::{VirtualMachineInstance, VmiBuilder};
