//! Optimizer strategy engine.
//!
//! An [`Optimizer`] wraps several candidate transports and dials them in
//! the order its [`Strategy`] plans, feeding every outcome back so adaptive
//! strategies can learn.

#[allow(clippy::module_inception)]
mod optimizer;
mod strategy;

pub use optimizer::Optimizer;
pub use strategy::{
    strategy_for, FirstStrategy, MinimizeDialDuration, RandomStrategy, RotateStrategy, Strategy,
    TrackStrategy,
};
