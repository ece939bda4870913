//! Core data model for tally.
//!
//! These types cross the boundary with the host application:
//! position samples fed in each tick, and the feedback categories
//! that select which message pool a transient message is drawn from.

mod feedback;
mod sample;

pub use feedback::FeedbackCategory;
pub use sample::PositionSample;
