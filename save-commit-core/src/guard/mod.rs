// save-trigger guard: token authority plus the policy filter chain

pub mod authority;
pub mod policy;

pub use authority::{GuardVerdict, MemoryTokenStore, SaveTriggerToken, TokenStore, TriggerAuthority};
pub use policy::{Decision, PolicyChain, PushDecision, SkipReason};
