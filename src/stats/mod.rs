//! Stats module - per-region aggregation

mod calculator;

pub use calculator::{
    AggregateResult, DescriptiveStats, FieldSummary, RegionSummary, StatKind, StatsCalculator,
    StatsError,
};
