use std::fmt;

/// Terminal condition reported by the solver.
///
/// The variants follow the return-status taxonomy of the large
/// interior point codes so that callers can print the value verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Stationarity and feasibility both within tolerance.
    SolveSucceeded,
    /// Iteration limit reached before convergence.
    MaximumIterationsExceeded,
    /// The line search collapsed without finding an acceptable step.
    SearchDirectionTooSmall,
    /// An objective, gradient or constraint evaluation returned a
    /// non-finite value.
    InvalidNumberDetected,
}

impl Status {
    /// Returns true for [`Status::SolveSucceeded`].
    pub fn converged(&self) -> bool {
        matches!(self, Status::SolveSucceeded)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Status::SolveSucceeded => "solve succeeded",
            Status::MaximumIterationsExceeded => "maximum iterations exceeded",
            Status::SearchDirectionTooSmall => "search direction becomes too small",
            Status::InvalidNumberDetected => "invalid number detected",
        })
    }
}

/// Barrier update strategy.
///
/// The projected gradient method has no barrier parameter; the value is
/// mapped onto the step-length rule instead. `Monotone` restarts every
/// iteration from the curvature estimate, `Adaptive` carries the last
/// accepted step length over and grows it after a first-try acceptance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MuStrategy {
    #[default]
    Monotone,
    Adaptive,
}

pub struct Options {
    /// Termination tolerance, applied to the infinity norm of the
    /// projected gradient step and to the constraint violation.
    pub tol: f64,

    /// Maximum number of iterations.
    pub max_it: usize,

    /// Barrier/step update strategy.
    pub mu_strategy: MuStrategy,

    /// Verbosity of the iteration log, `0..=12`. Levels of 5 and above
    /// log one line per iteration.
    pub print_level: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            max_it: 150,
            mu_strategy: MuStrategy::default(),
            print_level: 0,
        }
    }
}
