pub mod error;
pub mod lifecycle;
pub mod notify;

pub use error::EngineError;
pub use lifecycle::{
    ActivityPatch, ChecklistUpdate, CompleteOutcome, LifecycleController, NewActivity, Outcome,
};
pub use notify::{Notifier, NullNotifier, WebhookNotifier};
