//! Presentation state machines and chat session protocol for the twin
//! onboarding flow.  The view layer lives in `twin-tui`; everything here is
//! driven by [`core::TwinCore`]'s single event loop.

pub mod audio;
pub mod chat;
pub mod client;
pub mod core;
pub mod landing;
pub mod media;
pub mod mpv;
pub mod timer;
pub mod welcome;
