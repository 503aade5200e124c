//! Derivative-free, bound-constrained nonlinear optimization.
//!
//! Clients implement [`objective::GeometryModel`] to encode their domain as a
//! point in ℝⁿ and [`objective::Evaluator`] to turn a point into residuals;
//! the crate decides how to sample, refine, and terminate. Five kernels are
//! available directly under [`kernels`] (DIRECT, BOBYQA, Brent, CMA-ES,
//! Nelder-Mead simplex, Powell), and [`orchestrator::optimize`] drives them
//! through the two-stage and multi-start configurations described in
//! [`config::OptimizerOptions`].
//!
//! ```no_run
//! use boxopt::bounds::Bounds;
//! use boxopt::config::{OptimizerKind, OptimizerOptions};
//! use boxopt::objective::{Evaluator, GeometryModel, Objective};
//! use boxopt::orchestrator;
//!
//! struct Point(Vec<f64>);
//! impl GeometryModel for Point {
//!     fn dimension(&self) -> usize { self.0.len() }
//!     fn get_point(&self) -> Vec<f64> { self.0.clone() }
//!     fn set_point(&mut self, x: &[f64]) { self.0 = x.to_vec(); }
//! }
//!
//! struct Sphere;
//! impl Evaluator<Point> for Sphere {
//!     fn residual(&mut self, domain: &mut Point) -> boxopt::error::Result<Vec<f64>> {
//!         Ok(domain.0.clone())
//!     }
//! }
//!
//! let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
//! let domain = Point(vec![2.0, 3.0]);
//! let mut objective = Objective::new(domain, bounds, vec![1.0, 1.0], OptimizerKind::Bobyqa, Box::new(Sphere)).unwrap();
//! let mut options = OptimizerOptions::default();
//! let result = orchestrator::optimize(&mut objective, &mut options);
//! assert!(result.success);
//! ```

pub mod bounds;
pub mod config;
pub mod error;
pub mod kernels;
pub mod objective;
pub mod orchestrator;
pub mod result;
pub mod sampling;

pub use bounds::Bounds;
pub use config::{MultiStartStrategy, OptimizerKind, OptimizerOptions};
pub use error::{OptError, Result};
pub use objective::{CompositeModel, Evaluator, GeometryModel, Objective};
pub use orchestrator::optimize;
pub use result::OptimizationResult;
