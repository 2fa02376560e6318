pub mod batch;
pub mod convert;
pub mod error;
pub mod graph;
pub mod layout;
pub mod listing;
pub mod pipeline;
pub mod remote;
pub mod reshape;
pub mod study;
