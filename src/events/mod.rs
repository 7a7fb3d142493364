//! Event bus keeping independent view caches in step.

mod bus;

pub use bus::{EventBus, Handler, Subscription};
