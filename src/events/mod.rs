//! # Events Module
//!
//! Event-driven progress reporting.
//!
//! ## Design
//! The core library emits events through channels, so the CLI (or any other
//! front end) can subscribe and report decisions and progress without the
//! core printing anything.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Detect(DetectEvent::StackAccepted { output, inputs, .. }) => {
//!                 println!("{} <- {} frames", output.display(), inputs)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
