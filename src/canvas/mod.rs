pub mod applier;
pub mod batcher;
pub mod broadcaster;
pub mod ingress;
pub mod lifecycle;
pub mod lock_index;
pub mod token_bucket;
pub mod window_limiter;

pub use batcher::{Batcher, QueuedEdit};
pub use broadcaster::Broadcaster;
pub use lifecycle::CanvasCore;
pub use lock_index::LockIndex;
pub use token_bucket::TokenBucketLimiter;
pub use window_limiter::WindowCounterLimiter;
