//! Knowledge distillation from a teacher network.
//!
//! The student is trained against a blend of the teacher's
//! temperature-softened distribution and the true one-hot label:
//!
//! ```text
//! grad_i = (1 - α) * (softmax(s / T)_i - softmax(t / T)_i)
//!        +      α  * (softmax(s)_i     - y_i)
//! ```
//!
//! # References
//!
//! - Hinton, G., Vinyals, O., & Dean, J. (2015). Distilling the Knowledge in
//!   a Neural Network. NIPS Deep Learning Workshop.

use serde::{Deserialize, Serialize};

use crate::error::{CnnError, Result};
use crate::nn::{softmax, softmax_with_temperature};

/// Default softening temperature.
pub const DEFAULT_TEMPERATURE: f64 = 2.0;

/// Default weight of the hard-label term.
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Probability floor inside the soft-target log.
const LOG_FLOOR: f64 = 1e-10;

/// Configuration for knowledge distillation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistillationConfig {
    /// Temperature for softening probabilities.
    /// Higher T = softer distribution = more "dark knowledge"
    pub temperature: f64,
    /// Weight of the hard-label term; `1 - alpha` weights the soft term.
    pub alpha: f64,
}

impl Default for DistillationConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl DistillationConfig {
    /// Create with custom temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Create with custom alpha
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Checks `temperature > 0` and `alpha ∈ [0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`CnnError::InvalidHyperparameter`] naming the bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(CnnError::InvalidHyperparameter {
                param: "distillation_temperature".to_string(),
                value: format!("{}", self.temperature),
                constraint: "> 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(CnnError::InvalidHyperparameter {
                param: "distillation_alpha".to_string(),
                value: format!("{}", self.alpha),
                constraint: "in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Soft-target cross-entropy `-Σ softmax(t/T) · ln(max(softmax(s/T), 1e-10))`.
///
/// # Errors
///
/// Returns an error if the two vectors differ in length.
pub fn kd_loss(teacher: &[f64], student: &[f64], temperature: f64) -> Result<f64> {
    if teacher.len() != student.len() {
        return Err(CnnError::dimension_mismatch(
            "teacher/student outputs",
            teacher.len(),
            student.len(),
        ));
    }
    let soft_teacher = softmax_with_temperature(teacher, temperature);
    let soft_student = softmax_with_temperature(student, temperature);
    Ok(-soft_teacher
        .iter()
        .zip(&soft_student)
        .map(|(t, s)| t * s.max(LOG_FLOOR).ln())
        .sum::<f64>())
}

/// Computes distillation gradients for the student's output layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KnowledgeDistiller {
    config: DistillationConfig,
}

impl KnowledgeDistiller {
    /// Creates a distiller.
    #[must_use]
    pub fn new(config: DistillationConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &DistillationConfig {
        &self.config
    }

    /// Gradient of the blended loss with respect to the student's outputs.
    ///
    /// # Arguments
    ///
    /// * `student` - Student scores for one sample
    /// * `teacher` - Teacher scores for the same sample
    /// * `hard_targets` - One-hot true label
    ///
    /// # Errors
    ///
    /// Returns an error unless all three vectors have the same length.
    pub fn calculate_gradient(
        &self,
        student: &[f64],
        teacher: &[f64],
        hard_targets: &[f64],
    ) -> Result<Vec<f64>> {
        if student.len() != teacher.len() {
            return Err(CnnError::dimension_mismatch(
                "teacher outputs",
                student.len(),
                teacher.len(),
            ));
        }
        if student.len() != hard_targets.len() {
            return Err(CnnError::dimension_mismatch(
                "hard targets",
                student.len(),
                hard_targets.len(),
            ));
        }

        let DistillationConfig { temperature, alpha } = self.config;
        let soft_teacher = softmax_with_temperature(teacher, temperature);
        let soft_student = softmax_with_temperature(student, temperature);
        let hard_student = softmax(student);

        Ok(soft_student
            .iter()
            .zip(&soft_teacher)
            .zip(&hard_student)
            .zip(hard_targets)
            .map(|(((&ss, &st), &hs), &y)| (1.0 - alpha) * (ss - st) + alpha * (hs - y))
            .collect())
    }

    /// [`kd_loss`] at the configured temperature.
    ///
    /// # Errors
    ///
    /// Returns an error if the two vectors differ in length.
    pub fn calculate_kd_loss(&self, teacher: &[f64], student: &[f64]) -> Result<f64> {
        kd_loss(teacher, student, self.config.temperature)
    }
}

#[cfg(test)]
#[path = "distillation_tests.rs"]
mod tests;
