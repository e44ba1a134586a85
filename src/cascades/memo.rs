use std::collections::HashMap;

use anyhow::ensure;
use derive_more::Display;
use itertools::Itertools;
use log::{debug, trace};
use prettytable::Table;
use smallvec::SmallVec;

use crate::cost::Cost;
use crate::error::{OptResult, OptimizerError};
use crate::operator::Operator;
use crate::optimizer::{OptExpr, OptExprHandle, OptGroup, OptGroupHandle, OptimizerContext};
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::stat::Statistics;

use super::CascadesOptimizer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "G{}", _0)]
pub struct GroupId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "M{}", _0)]
pub struct MemberId(pub usize);

pub type GroupInputs = SmallVec<[GroupId; 2]>;

/// Cheapest member found for a group under one required physical property.
#[derive(Clone, Debug, PartialEq)]
pub struct Winner {
    pub member: MemberId,
    /// Cost of the member plus the winners of its inputs.
    pub cost: Cost,
    /// Property the member delivers.
    pub provided: PhysicalPropertySet,
    /// Requirement each input was optimized under.
    pub input_required: Vec<PhysicalPropertySet>,
}

/// One alternative of a group: an operator over input groups.
#[derive(Debug)]
pub struct Member {
    id: MemberId,
    operator: Operator,
    inputs: GroupInputs,
    group: GroupId,
    /// Sort added by the optimizer to deliver an order, its input is its own group.
    enforcer: bool,
}

impl Member {
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn inputs(&self) -> &[GroupId] {
        &self.inputs
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn is_enforcer(&self) -> bool {
        self.enforcer
    }
}

/// Set of logically equivalent members.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    members: Vec<MemberId>,
    explored: bool,
    logical_prop: LogicalProperty,
    stat: Statistics,
    winners: HashMap<PhysicalPropertySet, Winner>,
    /// Keys of `winners` in the order they were first set.
    winner_order: Vec<PhysicalPropertySet>,
}

impl Group {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    pub fn is_explored(&self) -> bool {
        self.explored
    }

    pub fn winner(&self, required: &PhysicalPropertySet) -> Option<&Winner> {
        self.winners.get(required)
    }

    pub fn winners(&self) -> impl Iterator<Item = (&PhysicalPropertySet, &Winner)> {
        self.winner_order
            .iter()
            .filter_map(move |required| self.winners.get(required).map(|w| (required, w)))
    }
}

impl OptGroup for Group {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn statistics(&self) -> &Statistics {
        &self.stat
    }
}

impl OptExpr for Member {
    type O = CascadesOptimizer;

    fn operator(&self) -> &Operator {
        &self.operator
    }

    fn inputs_len(&self, _opt: &CascadesOptimizer) -> usize {
        self.inputs.len()
    }

    fn input_at(&self, idx: usize, _opt: &CascadesOptimizer) -> GroupId {
        self.inputs[idx]
    }
}

impl OptExprHandle for MemberId {
    type O = CascadesOptimizer;
}

impl OptGroupHandle for GroupId {
    type O = CascadesOptimizer;
}

/// Outcome of [`Memo::insert`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Inserted {
    pub group: GroupId,
    pub member: MemberId,
    /// False when a structurally equal member already existed.
    pub is_new: bool,
}

/// Arena of groups and members.
///
/// A member is identified by its operator and input groups, the memo never holds two equal
/// members.
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    members: Vec<Member>,
    index: HashMap<(Operator, GroupInputs), MemberId>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn member(&self, id: MemberId) -> &Member {
        &self.members[id.0]
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Inserts `operator` over `inputs` into `target`, or into a new group when no target is
    /// given.
    ///
    /// An equal member is returned as is, even when it lives in a group other than `target`.
    pub fn insert(
        &mut self,
        operator: Operator,
        inputs: GroupInputs,
        target: Option<GroupId>,
        context: &OptimizerContext,
    ) -> OptResult<Inserted> {
        for input in &inputs {
            self.check_group(*input)?;
        }
        let key = (operator, inputs);
        if let Some(&existing) = self.index.get(&key) {
            let group = self.member(existing).group;
            if let Some(target) = target {
                if target != group {
                    trace!("{} in {} is also equivalent to {}", existing, group, target);
                }
            }
            return Ok(Inserted {
                group,
                member: existing,
                is_new: false,
            });
        }

        let (operator, inputs) = key;
        let group = match target {
            Some(target) => {
                self.check_group(target)?;
                ensure!(
                    !(operator.is_logical() && self.group(target).explored),
                    OptimizerError::InternalError(format!(
                        "logical member {} added to explored group {}",
                        operator, target
                    ))
                );
                target
            }
            None => self.new_group(&operator, &inputs, context)?,
        };

        let id = MemberId(self.members.len());
        trace!("insert {} {} into {}", id, operator, group);
        self.index.insert((operator.clone(), inputs.clone()), id);
        self.members.push(Member {
            id,
            operator,
            inputs,
            group,
            enforcer: false,
        });
        self.groups[group.0].members.push(id);
        Ok(Inserted {
            group,
            member: id,
            is_new: true,
        })
    }

    /// Sort enforcer of `group`, delivering `operator`'s order on top of the group itself.
    pub fn add_enforcer(&mut self, group: GroupId, operator: Operator) -> OptResult<MemberId> {
        self.check_group(group)?;
        let key = (operator, GroupInputs::from_slice(&[group]));
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }

        let id = MemberId(self.members.len());
        let (operator, inputs) = key;
        trace!("enforce {} on {}", operator, group);
        self.index.insert((operator.clone(), inputs.clone()), id);
        self.members.push(Member {
            id,
            operator,
            inputs,
            group,
            enforcer: true,
        });
        self.groups[group.0].members.push(id);
        Ok(id)
    }

    fn new_group(
        &mut self,
        operator: &Operator,
        inputs: &[GroupId],
        context: &OptimizerContext,
    ) -> OptResult<GroupId> {
        let logical = operator.as_logical().ok_or_else(|| {
            OptimizerError::InternalError(format!("physical {} cannot start a group", operator))
        })?;
        let derived_inputs: Vec<(&LogicalProperty, f64)> = inputs
            .iter()
            .map(|g| {
                let group = self.group(*g);
                (&group.logical_prop, group.stat.row_count())
            })
            .collect();
        let (logical_prop, stat) = context.derive(logical, &derived_inputs)?;

        let id = GroupId(self.groups.len());
        debug!("new group {} for {} with {}", id, operator, stat);
        self.groups.push(Group {
            id,
            members: vec![],
            explored: false,
            logical_prop,
            stat,
            winners: HashMap::new(),
            winner_order: vec![],
        });
        Ok(id)
    }

    fn check_group(&self, group: GroupId) -> OptResult<()> {
        ensure!(
            group.0 < self.groups.len(),
            OptimizerError::InternalError(format!("unknown group {}", group))
        );
        Ok(())
    }

    pub fn mark_explored(&mut self, group: GroupId) -> OptResult<()> {
        self.check_group(group)?;
        let group = &mut self.groups[group.0];
        ensure!(
            !group.explored,
            OptimizerError::InternalError(format!("{} explored twice", group.id))
        );
        group.explored = true;
        Ok(())
    }

    /// Records `winner` for `required` when it is strictly cheaper than the current one.
    pub fn offer_winner(
        &mut self,
        group: GroupId,
        required: &PhysicalPropertySet,
        winner: Winner,
    ) -> OptResult<bool> {
        self.check_group(group)?;
        ensure!(
            winner.cost.is_valid(),
            OptimizerError::InternalError(format!("invalid cost {} in {}", winner.cost, group))
        );
        let group = &mut self.groups[group.0];
        match group.winners.get(required) {
            Some(current) if winner.cost >= current.cost => Ok(false),
            current => {
                if current.is_none() {
                    group.winner_order.push(required.clone());
                }
                debug!(
                    "{} under {}: {} with cost {}",
                    group.id, required, winner.member, winner.cost
                );
                group.winners.insert(required.clone(), winner);
                Ok(true)
            }
        }
    }

    /// Table of every group with its members and winners.
    pub fn dump(&self) -> String {
        let mut table = Table::new();
        table.add_row(row!["Group", "Explored", "Rows", "Logical", "Physical", "Winners"]);
        for group in &self.groups {
            let (logical, physical): (Vec<&Member>, Vec<&Member>) = group
                .members
                .iter()
                .map(|m| self.member(*m))
                .partition(|m| m.operator.is_logical());
            let winners = group
                .winners()
                .map(|(required, w)| format!("{}: {} cost={}", required, w.member, w.cost))
                .join("\n");
            table.add_row(row![
                group.id,
                group.explored,
                group.stat.row_count(),
                logical.iter().map(|m| format_member(m)).join("\n"),
                physical.iter().map(|m| format_member(m)).join("\n"),
                winners
            ]);
        }
        table.to_string()
    }
}

fn format_member(member: &Member) -> String {
    format!(
        "{} {} [{}]",
        member.id,
        member.operator,
        member.inputs.iter().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::catalog::{InMemoryCatalog, TableDef};
    use crate::operator::{LogicalOperator, PhysicalOperator, PhysicalTableScan, TableScan};
    use crate::options::QueryOptions;

    fn context() -> OptimizerContext {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_table(TableDef::new("t", vec!["a"]), 1000.0);
        OptimizerContext::new(Rc::new(catalog), QueryOptions::default()).unwrap()
    }

    fn scan() -> Operator {
        LogicalOperator::LogicalScan(TableScan::new("t")).into()
    }

    fn winner(member: MemberId, cost: f64) -> Winner {
        Winner {
            member,
            cost: Cost::from(cost),
            provided: PhysicalPropertySet::default(),
            input_required: vec![],
        }
    }

    #[test]
    fn test_insert_creates_group_once() {
        let context = context();
        let mut memo = Memo::new();
        let first = memo.insert(scan(), GroupInputs::new(), None, &context).unwrap();
        let second = memo.insert(scan(), GroupInputs::new(), None, &context).unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.member, second.member);
        assert_eq!(1, memo.group_count());
        assert_eq!(1, memo.member_count());
        assert_eq!(1000.0, memo.group(first.group).statistics().row_count());
    }

    #[test]
    fn test_explored_group_rejects_logical_members() {
        let context = context();
        let mut memo = Memo::new();
        let group = memo.insert(scan(), GroupInputs::new(), None, &context).unwrap().group;
        memo.mark_explored(group).unwrap();
        assert!(memo.mark_explored(group).is_err());

        let other = LogicalOperator::LogicalScan(TableScan::new("t").with_alias("x")).into();
        assert!(memo.insert(other, GroupInputs::new(), Some(group), &context).is_err());

        let physical: Operator =
            PhysicalOperator::from(PhysicalTableScan::new(TableScan::new("t"))).into();
        let inserted = memo.insert(physical, GroupInputs::new(), Some(group), &context).unwrap();
        assert_eq!(group, inserted.group);
        assert_eq!(2, memo.group(group).members().len());
    }

    #[test]
    fn test_winner_replaced_only_when_cheaper() {
        let context = context();
        let mut memo = Memo::new();
        let inserted = memo.insert(scan(), GroupInputs::new(), None, &context).unwrap();
        let required = PhysicalPropertySet::default();

        assert!(memo.offer_winner(inserted.group, &required, winner(inserted.member, 10.0)).unwrap());
        assert!(!memo.offer_winner(inserted.group, &required, winner(MemberId(7), 10.0)).unwrap());
        assert!(memo.offer_winner(inserted.group, &required, winner(MemberId(7), 5.0)).unwrap());
        assert_eq!(MemberId(7), memo.group(inserted.group).winner(&required).unwrap().member);
        assert!(memo
            .offer_winner(inserted.group, &required, winner(MemberId(8), f64::NAN))
            .is_err());
    }

    #[test]
    fn test_dump_lists_groups() {
        let context = context();
        let mut memo = Memo::new();
        memo.insert(scan(), GroupInputs::new(), None, &context).unwrap();
        let dump = memo.dump();
        assert!(dump.contains("Group"));
        assert!(dump.contains("G0"));
        assert!(dump.contains("M0"));
    }
}
