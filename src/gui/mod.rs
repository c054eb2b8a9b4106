//! Terminal screens for running an exam by hand.

mod acuity_picker;
mod error;
mod exam_runner;

pub use acuity_picker::acuity_picker;
pub use error::ChartGuiError;
pub use exam_runner::{run_exam, ExamScreen};
