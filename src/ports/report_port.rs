//! Report generation port trait.

use crate::domain::error::MacrocycleError;
use crate::domain::evaluation::Evaluation;

/// Port for writing evaluation reports.
pub trait ReportPort {
    fn write(&self, evaluation: &Evaluation, output_path: &str) -> Result<(), MacrocycleError>;

    fn render(&self, evaluation: &Evaluation) -> Result<String, MacrocycleError>;
}
