pub mod charts;
pub mod insights;
pub mod orchestrator;
pub mod relevance;
pub mod response;
pub mod results;
