//! Approval policy evaluation.
//!
//! The evaluation pipeline, leaves first:
//!
//! ```text
//! ┌──────────────┐
//! │ PolicyEngine │  top-level OR across policy.approval
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐   ┌────────────────────┐
//! │ rule tree    │──▶│ named leaf rules   │
//! │ and/or/list  │   │  if    → condition │
//! │ three-valued │   │  requires → filter │
//! └──────────────┘   │    + requirement   │
//!                    └────────────────────┘
//! ```
//!
//! Rules evaluate to a three-valued [`RuleOutcome`]: a rule whose gate does
//! not apply is `Skipped` and drops out of its parent's reduction instead of
//! failing it. Only `Pass` at the top level approves a deployment.

mod condition;
mod engine;
mod requirement;
mod review;

pub use engine::{Evaluation, PolicyEngine, RuleOutcome, RuleRecord};
