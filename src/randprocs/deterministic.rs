use std::any::Any;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::functions::Function;
use crate::nalgebra_support::check_points;
use crate::randprocs::RandomProcess;

/// A process with no uncertainty: `f = g` almost surely.
#[derive(Clone, Debug)]
pub struct DeterministicProcess {
    function: Arc<dyn Function>,
}

impl DeterministicProcess {
    pub fn new(function: Arc<dyn Function>) -> Self {
        DeterministicProcess { function }
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }
}

impl RandomProcess for DeterministicProcess {
    fn input_dim(&self) -> usize {
        self.function.input_dim()
    }

    fn name(&self) -> &'static str {
        "DeterministicProcess"
    }

    fn mean(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.function.evaluate_batch(x)
    }

    fn cov(&self, x0: &DMatrix<f64>, x1: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_points(self.name(), self.input_dim(), x0)?;
        check_points(self.name(), self.input_dim(), x1)?;
        Ok(DMatrix::zeros(x0.nrows(), x1.nrows()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
