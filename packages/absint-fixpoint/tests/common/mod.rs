//! Shared fixtures: a small interval domain and a table-driven transfer
//! function, enough to run the engine over hand-written control flow.

use absint_fixpoint::{
    AbstractState, Addr, AnalysisCtx, Flows, ProgramCtx, ProgramPoint, Result, TransferFunction,
};
use rustc_hash::FxHashMap;

/// Interval lattice over `i64` with hull join and jump-to-extreme widening.
#[derive(Debug, Clone)]
pub struct Interval {
    pub lo: i64,
    pub hi: i64,
    ctx: AnalysisCtx,
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.lo == other.lo && self.hi == other.hi
    }
}

impl Interval {
    pub fn constant(value: i64) -> Self {
        Self::range(value, value)
    }

    pub fn range(lo: i64, hi: i64) -> Self {
        assert!(lo <= hi, "empty interval");
        Self {
            lo,
            hi,
            ctx: AnalysisCtx::unknown(),
        }
    }

    /// The interval shifted by a constant, saturating at the bounds
    pub fn shift(&self, delta: i64) -> Self {
        Self {
            lo: self.lo.saturating_add(delta),
            hi: self.hi.saturating_add(delta),
            ctx: self.ctx.clone(),
        }
    }
}

impl AbstractState for Interval {
    fn subset_or_equal(&self, other: &Self) -> bool {
        other.lo <= self.lo && self.hi <= other.hi
    }

    fn join(&self, other: &Self) -> Self {
        Self {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
            ctx: self.ctx.clone(),
        }
    }

    fn widen(&self, other: &Self) -> Self {
        Self {
            lo: if other.lo < self.lo { i64::MIN } else { self.lo },
            hi: if other.hi > self.hi { i64::MAX } else { self.hi },
            ctx: self.ctx.clone(),
        }
    }

    fn context(&self) -> &AnalysisCtx {
        &self.ctx
    }

    fn with_context(mut self, ctx: AnalysisCtx) -> Self {
        self.ctx = ctx;
        self
    }
}

pub type Step = Box<dyn Fn(&ProgramCtx, Interval) -> Result<Flows<Interval>>>;

/// A program as a table of per-address transfer steps.
pub struct Program {
    instructions: FxHashMap<Addr, Step>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            instructions: FxHashMap::default(),
        }
    }

    pub fn instruction<F>(mut self, address: u64, step: F) -> Self
    where
        F: Fn(&ProgramCtx, Interval) -> Result<Flows<Interval>> + 'static,
    {
        self.instructions.insert(Addr::new(address), Box::new(step));
        self
    }
}

impl TransferFunction<Interval> for Program {
    fn eval(&mut self, point: &ProgramCtx, state: Interval) -> Result<Flows<Interval>> {
        let step = self
            .instructions
            .get(&point.address())
            .unwrap_or_else(|| panic!("no instruction at {}", point.address()));
        step(point, state)
    }
}

pub fn at(address: u64) -> Addr {
    Addr::new(address)
}
