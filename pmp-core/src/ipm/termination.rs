//! Feasibility predicates, duality gap, and termination tests.

use rug::Assign;

use super::Solver;
use crate::problem::TerminateReason;
use crate::real::{self, Real};

/// |p − d| / max((|p| + |d|)/2, 1)
pub fn duality_gap(primal_objective: &Real, dual_objective: &Real) -> Real {
    let prec = real::precision();
    let mut num = Real::with_val(prec, primal_objective - dual_objective);
    num.abs_mut();

    let mut den = Real::with_val(prec, primal_objective.abs_ref());
    let abs_dual = Real::with_val(prec, dual_objective.abs_ref());
    den += &abs_dual;
    den /= 2;
    if den < 1 {
        den.assign(1);
    }
    num /= &den;
    num
}

impl<'a> Solver<'a> {
    pub(crate) fn is_primal_feasible(&self) -> bool {
        self.primal_error <= self.primal_error_threshold
    }

    pub(crate) fn is_dual_feasible(&self) -> bool {
        self.dual_error <= self.dual_error_threshold
    }

    pub(crate) fn is_optimal(&self) -> bool {
        self.duality_gap <= self.duality_gap_threshold
    }

    /// Current primal objective value.
    pub fn primal_objective(&self) -> &Real {
        &self.primal_objective
    }

    /// Current dual objective value.
    pub fn dual_objective(&self) -> &Real {
        &self.dual_objective
    }
}

/// Decide whether the iterate at hand is final. Runtime, iteration and
/// complementarity caps are handled by the driver loop itself.
pub(crate) fn check_termination(solver: &Solver) -> Option<TerminateReason> {
    let primal_feasible = solver.is_primal_feasible();
    let dual_feasible = solver.is_dual_feasible();

    if primal_feasible && dual_feasible && solver.is_optimal() {
        return Some(TerminateReason::PrimalDualOptimal);
    }
    if primal_feasible && solver.parameters.find_primal_feasible {
        return Some(TerminateReason::PrimalFeasible);
    }
    if dual_feasible && solver.parameters.find_dual_feasible {
        return Some(TerminateReason::DualFeasible);
    }
    None
}
