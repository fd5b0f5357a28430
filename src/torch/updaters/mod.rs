//! Second-order updaters for the policy and value networks
//!
//! Both take a single trust region step per call:
//! a conjugate gradient solve against a Hessian-vector product followed by a scaled step.
mod policy_trpo;
mod value;

pub use policy_trpo::{
    update_policy, KlConstraint, PolicyLineSearch, PolicyStats, SurrogateObjective,
};
pub use value::{update_value, ValueConstraint, ValueStepOutcome};
