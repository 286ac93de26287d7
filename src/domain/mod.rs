// Domain layer - Alignment model, kernels, losses and the rules tying them together

pub mod errors;
pub mod kernels;
pub mod losses;
pub mod model;
pub mod problem;
pub mod rules;
