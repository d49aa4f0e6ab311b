//! Plain data shared by the pipeline, the flow, and the presentation layer.

pub mod answer;
pub mod payload;
pub mod profile;
pub mod question;
