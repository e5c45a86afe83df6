//! Cost models and solver configuration.
//!
//! Every model has a canonical name that doubles as the label of a run:
//! `w-<gain>-<loss>[-<gpl>]`, `r-<limit>[-<gpl>]` and `t-<depth>`.
//! A negative restriction limit is written with a doubled dash (`r--2`).

use std::fmt;
use std::str::FromStr;

use crate::error::{PhyboError, Result};

/// Default number of gains allowed along one lineage (no re-gains).
pub const DEFAULT_GPL: usize = 1;

/// Parsimony cost model selecting the solver algorithm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CostModel {
    /// Weighted parsimony: minimise `gains * gain_weight + losses * loss_weight`.
    Weighted {
        gain_weight: f64,
        loss_weight: f64,
        gpl: usize,
    },
    /// Minimise the number of events with at most `limit` gains, or at most
    /// `|limit|` losses when `limit` is negative.
    Restriction { limit: i32, gpl: usize },
    /// Top-down splitting heuristic down to `max_depth` levels below the root.
    TopDown { max_depth: usize },
}

impl CostModel {
    pub fn weighted(gain_weight: f64, loss_weight: f64, gpl: i64) -> Result<Self> {
        let model = CostModel::Weighted {
            gain_weight,
            loss_weight,
            gpl: check_gpl(gpl)?,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn restriction(limit: i64, gpl: i64) -> Result<Self> {
        let limit = i32::try_from(limit)
            .map_err(|_| PhyboError::config(format!("restriction value {} is out of range", limit)))?;
        let model = CostModel::Restriction {
            limit,
            gpl: check_gpl(gpl)?,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn topdown(max_depth: i64) -> Result<Self> {
        if max_depth < 0 {
            return Err(PhyboError::config(format!(
                "top-down depth must not be negative, got {}",
                max_depth
            )));
        }
        Ok(CostModel::TopDown {
            max_depth: max_depth as usize,
        })
    }

    /// Check parameters of a model that may have been built field by field.
    pub fn validate(&self) -> Result<()> {
        match *self {
            CostModel::Weighted {
                gain_weight,
                loss_weight,
                gpl,
            } => {
                for (label, weight) in [("gain", gain_weight), ("loss", loss_weight)] {
                    if !weight.is_finite() || weight <= 0.0 {
                        return Err(PhyboError::config(format!(
                            "{} weight must be a positive number, got {}",
                            label, weight
                        )));
                    }
                }
                check_gpl(gpl as i64).map(|_| ())
            }
            CostModel::Restriction { limit, gpl } => {
                if limit == 0 {
                    return Err(PhyboError::config("restriction value must not be zero"));
                }
                check_gpl(gpl as i64).map(|_| ())
            }
            CostModel::TopDown { .. } => Ok(()),
        }
    }

    /// Gains allowed along one lineage; unbounded for the top-down heuristic.
    pub fn gains_per_lineage(&self) -> usize {
        match *self {
            CostModel::Weighted { gpl, .. } | CostModel::Restriction { gpl, .. } => gpl,
            CostModel::TopDown { .. } => usize::MAX,
        }
    }

    /// Score of a complete scenario with the given event counts.
    pub fn score(&self, gains: usize, losses: usize) -> f64 {
        match *self {
            CostModel::Weighted {
                gain_weight,
                loss_weight,
                ..
            } => gains as f64 * gain_weight + losses as f64 * loss_weight,
            CostModel::Restriction { .. } | CostModel::TopDown { .. } => (gains + losses) as f64,
        }
    }

    /// Whether the event counts respect the model's hard caps.
    pub fn admits(&self, gains: usize, losses: usize) -> bool {
        match *self {
            CostModel::Restriction { limit, .. } if limit > 0 => gains <= limit as usize,
            CostModel::Restriction { limit, .. } => losses <= limit.unsigned_abs() as usize,
            _ => true,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

fn check_gpl(gpl: i64) -> Result<usize> {
    if gpl < 0 {
        Err(PhyboError::config(format!(
            "gains-per-lineage cap must not be negative, got {}",
            gpl
        )))
    } else if gpl == 0 {
        Err(PhyboError::config("gains-per-lineage cap must be at least 1"))
    } else {
        Ok(gpl as usize)
    }
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 && weight.abs() < 1e15 {
        format!("{}", weight as i64)
    } else {
        format!("{}", weight)
    }
}

impl fmt::Display for CostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CostModel::Weighted {
                gain_weight,
                loss_weight,
                gpl,
            } => {
                write!(f, "w-{}-{}", format_weight(gain_weight), format_weight(loss_weight))?;
                if gpl != DEFAULT_GPL {
                    write!(f, "-{}", gpl)?;
                }
                Ok(())
            }
            CostModel::Restriction { limit, gpl } => {
                write!(f, "r-{}", limit)?;
                if gpl != DEFAULT_GPL {
                    write!(f, "-{}", gpl)?;
                }
                Ok(())
            }
            CostModel::TopDown { max_depth } => write!(f, "t-{}", max_depth),
        }
    }
}

/// Split a model name on '-', folding the empty token produced by a doubled
/// dash back into a minus sign.
fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut negate = false;
    for (i, token) in name.split('-').enumerate() {
        if token.is_empty() && i > 0 {
            negate = true;
            continue;
        }
        if negate {
            tokens.push(format!("-{}", token));
            negate = false;
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

fn parse_integer(name: &str, what: &str, token: &str) -> Result<i64> {
    token.trim().parse::<i64>().map_err(|_| {
        PhyboError::config(format!("{} in '{}' must be an integer, got '{}'", what, name, token))
    })
}

fn parse_weight(name: &str, token: &str) -> Result<f64> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| PhyboError::config(format!("invalid weight '{}' in '{}'", token, name)))
}

impl FromStr for CostModel {
    type Err = PhyboError;

    fn from_str(name: &str) -> Result<Self> {
        let tokens = name_tokens(name.trim());
        let (mode, params) = tokens
            .split_first()
            .ok_or_else(|| PhyboError::config("empty cost model name"))?;

        match (mode.as_str(), params) {
            ("w" | "weighted", [gain, loss]) => {
                CostModel::weighted(parse_weight(name, gain)?, parse_weight(name, loss)?, DEFAULT_GPL as i64)
            }
            ("w" | "weighted", [gain, loss, gpl]) => CostModel::weighted(
                parse_weight(name, gain)?,
                parse_weight(name, loss)?,
                parse_integer(name, "gains-per-lineage cap", gpl)?,
            ),
            ("r" | "restriction", [limit]) => CostModel::restriction(
                parse_integer(name, "restriction value", limit)?,
                DEFAULT_GPL as i64,
            ),
            ("r" | "restriction", [limit, gpl]) => CostModel::restriction(
                parse_integer(name, "restriction value", limit)?,
                parse_integer(name, "gains-per-lineage cap", gpl)?,
            ),
            ("t" | "topdown", [depth]) => CostModel::topdown(parse_integer(name, "top-down depth", depth)?),
            ("w" | "weighted" | "r" | "restriction" | "t" | "topdown", _) => Err(PhyboError::config(format!(
                "wrong number of parameters in cost model '{}'",
                name
            ))),
            _ => Err(PhyboError::config(format!("unknown cost model '{}'", name))),
        }
    }
}

/// How UNKNOWN leaves enter the dynamic program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MissingData {
    /// Treat missing data as absence.
    #[default]
    Absent,
    /// Keep missing data as a wildcard compatible with either state.
    Wildcard,
}

/// Configuration of one solver run.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Cost model selecting the algorithm. Default: w-1-1
    pub model: CostModel,
    /// Handling of UNKNOWN leaves. Default: Absent
    pub missing_data: MissingData,
    /// Among equally cheap scenarios prefer the one with most gains (gains
    /// toward the leaves) instead of the fewest. Default: true
    pub push_gains: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            model: CostModel::Weighted {
                gain_weight: 1.0,
                loss_weight: 1.0,
                gpl: DEFAULT_GPL,
            },
            missing_data: MissingData::Absent,
            push_gains: true,
        }
    }
}

impl SolverConfig {
    pub fn new(model: CostModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    pub fn with_missing_data(mut self, missing_data: MissingData) -> Self {
        self.missing_data = missing_data;
        self
    }

    pub fn with_push_gains(mut self, push_gains: bool) -> Self {
        self.push_gains = push_gains;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()
    }
}
