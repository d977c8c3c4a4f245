use serde_derive::Serialize;
use std::time::{Duration, Instant};

use crate::context::SearchContext;
use crate::grid::Grid;

/// Behavior switches for the fill algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Permit the same word in more than one slot.
    pub allow_dups: bool,
    /// On a dead end, pop straight to the most recent slot whose choice
    /// could have affected the failure.
    pub backjump: bool,
    /// Refine failed slots' candidate lists using conflict information.
    pub prune: bool,
    pub verbose_prune: bool,
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Give up once this much time has elapsed (checked every
    /// `step_period` steps).
    pub max_time: Option<Duration>,
    /// Word installations between timeout checks and progress reports.
    pub step_period: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            max_time: None,
            step_period: 10_000,
        }
    }
}

/// What the host wants after seeing a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverAction {
    Continue,
    Restart,
    Exit,
}

/// How a search run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// No more solutions.
    Exhausted,
    /// `max_time` elapsed.
    Timeout,
    /// The handler asked to stop.
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Statistics {
    pub nsteps: u64,
    pub elapsed: Duration,
}

/// The yield/continue contract between the search loop and its host.
pub trait SearchHandler {
    /// Called with the grid in a solved state. The handler may replace the
    /// context's dictionary (after a veto edit) before asking for a restart.
    fn on_solution(
        &mut self,
        grid: &Grid,
        ctx: &mut SearchContext,
        stats: &Statistics,
    ) -> SolverAction;

    /// Called every `step_period` steps.
    fn on_progress(&mut self, _grid: &Grid, _ctx: &SearchContext) {}
}

/// The report emitted under `--perf`.
#[derive(Debug, Serialize)]
pub struct PerfReport {
    pub success: u8,
    pub nsteps: u64,
    pub cpu_time: f64,
}

impl PerfReport {
    #[must_use]
    pub fn new(success: bool, stats: &Statistics) -> PerfReport {
        PerfReport {
            success: u8::from(success),
            nsteps: stats.nsteps,
            cpu_time: stats.elapsed.as_secs_f64(),
        }
    }
}

/// Drive the grid until a decision point: each solution is offered to the
/// handler (which answers continue / restart / exit), exhaustion and timeout
/// end the run. A completed grid whose stack carries a duplicated word (a
/// slot can be filled in by its crossers without ever being scanned) is not
/// a solution unless dups are allowed.
pub fn find_solutions(
    grid: &mut Grid,
    ctx: &mut SearchContext,
    opts: &SearchOptions,
    params: &SearchParams,
    handler: &mut dyn SearchHandler,
) -> SearchOutcome {
    let start = Instant::now();
    let mut steps_at_check = grid.nsteps;
    loop {
        if crate::CHECK_INVARIANTS {
            grid.check_invariants(ctx);
        }

        if grid.is_complete() {
            if opts.allow_dups || grid.stack_words_distinct() {
                grid.nsolutions += 1;
                let stats = Statistics {
                    nsteps: grid.nsteps,
                    elapsed: start.elapsed(),
                };
                match handler.on_solution(grid, ctx, &stats) {
                    SolverAction::Continue => {}
                    SolverAction::Restart => {
                        grid.restart(ctx);
                        continue;
                    }
                    SolverAction::Exit => return SearchOutcome::Stopped,
                }
            }
            if !grid.backtrack(ctx, opts) {
                return SearchOutcome::Exhausted;
            }
            continue;
        }

        if !grid.push_next_slot(ctx, opts) && !grid.backtrack(ctx, opts) {
            return SearchOutcome::Exhausted;
        }

        if grid.nsteps - steps_at_check >= params.step_period {
            steps_at_check = grid.nsteps;
            if let Some(max_time) = params.max_time {
                if start.elapsed() > max_time {
                    return SearchOutcome::Timeout;
                }
            }
            handler.on_progress(grid, ctx);
        }
    }
}
