//! Level hierarchy construction.
//!
//! A [`Level`] bundles the grid, model, operator, and the transfer to the
//! next-coarser level for one multigrid depth. A [`Hierarchy`] is the ordered
//! sequence of levels from finest to coarsest, built once per
//! (grid, model, frequency) combination. It is read-only after construction
//! and safe to share across repeated solves at that frequency; caching and
//! invalidation on grid/model change are the caller's responsibility.

use crate::config::SolverOptions;
use crate::error::EmError;
use crate::mesh::TensorGrid;
use crate::model::Model;
use crate::operator::CurlCurlOperator;
use crate::transfer::GridTransfer;

/// One multigrid depth.
#[derive(Debug, Clone)]
pub struct Level {
    pub grid: TensorGrid,
    pub model: Model,
    pub op: CurlCurlOperator,
    /// Transfer to the next-coarser level; `None` on the coarsest level.
    pub to_coarse: Option<GridTransfer>,
}

/// Ordered levels, finest (index 0) to coarsest.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    levels: Vec<Level>,
    frequency: f64,
    omega: f64,
}

impl Hierarchy {
    /// Build the level hierarchy for a problem instance. `frequency` is in
    /// Hz; zero selects the magnetostatic limit.
    pub fn build(
        grid: &TensorGrid,
        model: &Model,
        frequency: f64,
        opts: &SolverOptions,
    ) -> Result<Self, EmError> {
        opts.validate()?;
        if frequency < 0.0 {
            return Err(EmError::NegativeFrequency(frequency));
        }
        let omega = 2.0 * std::f64::consts::PI * frequency;

        let mut levels = vec![Level {
            grid: grid.clone(),
            model: model.clone(),
            op: CurlCurlOperator::new(grid, model, omega)?,
            to_coarse: None,
        }];

        while levels.len() < opts.max_levels {
            let fine = levels.last().unwrap();
            if fine.grid.n_cells_total() <= opts.min_coarse_cells {
                break;
            }
            let Some(coarse_grid) = fine.grid.coarsen() else {
                break;
            };
            let coarse_model = fine.model.coarsen(&fine.grid, &coarse_grid);
            let transfer = GridTransfer::new(&fine.grid, &coarse_grid);
            let op = CurlCurlOperator::new(&coarse_grid, &coarse_model, omega)?;
            levels.last_mut().unwrap().to_coarse = Some(transfer);
            levels.push(Level {
                grid: coarse_grid,
                model: coarse_model,
                op,
                to_coarse: None,
            });
        }

        Ok(Self {
            levels,
            frequency,
            omega,
        })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest(&self) -> &Level {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &Level {
        self.levels.last().unwrap()
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }
}
