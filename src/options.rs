//! Per-query optimizer configuration.

use std::str::FromStr;
use std::time::Duration;

use enumset::{EnumSet, EnumSetType};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{OptResult, OptimizerError};
use crate::heuristic::MatchOrder;
use crate::stat::EstimatorVersion;

/// Search features that can be switched off per query.
///
/// Switching a feature off only narrows the search space.
#[derive(EnumSetType, Debug, Display, EnumString, EnumIter)]
pub enum OptimizerFeature {
    #[strum(to_string = "hash_join", serialize = "hashjoin")]
    HashJoin,
    #[strum(to_string = "nested_loop_join", serialize = "nljoin")]
    NestedLoopJoin,
    #[strum(to_string = "stream_agg", serialize = "streamagg")]
    StreamAgg,
    #[strum(to_string = "index_seek", serialize = "indexseek")]
    IndexSeek,
    #[strum(to_string = "agg_split", serialize = "aggsplit")]
    AggSplit,
    #[strum(to_string = "join_commutativity")]
    JoinCommutativity,
    #[strum(to_string = "join_associativity")]
    JoinAssociativity,
}

/// What happens when the search budget runs out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum BudgetPolicy {
    /// Stop exploring and finish with what the memo holds.
    Stop,
    /// Abort optimization with [`OptimizerError::BudgetExceeded`].
    Fail,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchBudget {
    pub max_groups: usize,
    pub max_members: usize,
    pub max_rule_applications: usize,
    pub timeout: Option<Duration>,
    pub policy: BudgetPolicy,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_groups: 10_000,
            max_members: 100_000,
            max_rule_applications: 1_000_000,
            timeout: None,
            policy: BudgetPolicy::Stop,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    pub features: EnumSet<OptimizerFeature>,
    /// Memo search when set, direct substitution otherwise.
    pub use_memo: bool,
    /// Collapse inner join trees into join blocks solved by DPccp.
    pub use_join_order_solver: bool,
    pub disable_cross_join: bool,
    pub estimator_version: EstimatorVersion,
    pub budget: SearchBudget,
    pub match_order: MatchOrder,
    pub max_iter_times: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            features: EnumSet::all() - OptimizerFeature::StreamAgg,
            use_memo: true,
            use_join_order_solver: false,
            disable_cross_join: true,
            estimator_version: EstimatorVersion::V1_0,
            budget: SearchBudget::default(),
            match_order: MatchOrder::TopDown,
            max_iter_times: 1000,
        }
    }
}

impl QueryOptions {
    pub fn is_enabled(&self, feature: OptimizerFeature) -> bool {
        self.features.contains(feature)
    }

    pub fn enable(mut self, feature: OptimizerFeature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn disable(mut self, feature: OptimizerFeature) -> Self {
        self.features.remove(feature);
        self
    }

    /// Applies one `key=value` setting, e.g. `enable_hashjoin=false`.
    pub fn set(&mut self, key: &str, value: &str) -> OptResult<()> {
        let invalid = || OptimizerError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
        };

        if let Some(name) = key.strip_prefix("enable_") {
            let feature = OptimizerFeature::from_str(name).map_err(|_| invalid())?;
            if parse_bool(value).ok_or_else(invalid)? {
                self.features.insert(feature);
            } else {
                self.features.remove(feature);
            }
            return Ok(());
        }

        match key {
            "use_memo" => self.use_memo = parse_bool(value).ok_or_else(invalid)?,
            "use_join_order_solver" | "memo_use_joinorder_solver" => {
                self.use_join_order_solver = parse_bool(value).ok_or_else(invalid)?
            }
            "disable_cross_join" | "memo_disable_crossjoin" => {
                self.disable_cross_join = parse_bool(value).ok_or_else(invalid)?
            }
            "estimator_version" => {
                self.estimator_version = EstimatorVersion::from_str(value)
                    .map_err(|_| OptimizerError::UnknownEstimatorVersion(value.to_string()))?
            }
            "max_groups" => self.budget.max_groups = value.parse().map_err(|_| invalid())?,
            "max_members" => self.budget.max_members = value.parse().map_err(|_| invalid())?,
            "max_rule_applications" => {
                self.budget.max_rule_applications = value.parse().map_err(|_| invalid())?
            }
            "timeout_ms" => {
                self.budget.timeout = Some(Duration::from_millis(
                    value.parse().map_err(|_| invalid())?,
                ))
            }
            "budget_policy" => {
                self.budget.policy = BudgetPolicy::from_str(value).map_err(|_| invalid())?
            }
            "match_order" => self.match_order = MatchOrder::from_str(value).map_err(|_| invalid())?,
            "max_iter_times" => self.max_iter_times = value.parse().map_err(|_| invalid())?,
            _ => return Err(invalid().into()),
        }
        Ok(())
    }

    /// Parses a list of `key=value` settings on top of the defaults.
    pub fn from_settings<'a, I: IntoIterator<Item = &'a str>>(settings: I) -> OptResult<Self> {
        let mut options = Self::default();
        for setting in settings {
            let (key, value) = setting.split_once('=').ok_or_else(|| {
                OptimizerError::InvalidOption {
                    key: setting.to_string(),
                    value: String::new(),
                }
            })?;
            options.set(key.trim(), value.trim())?;
        }
        Ok(options)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
