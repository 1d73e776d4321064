//! Order execution for margin and derivatives exchanges

pub mod pipeline;

pub use pipeline::{
    check_lot_size, size_in_contracts, OrderPipeline, PipelineOutcome, PipelineStep, StepReport,
    StepStatus,
};
