//! Charts module - Figure building and rendering with plotters

mod figure;
mod renderer;
pub mod series;

pub use figure::{Figure, Plot, Series};
pub use renderer::{ChartError, ChartKind, ChartRenderer};
