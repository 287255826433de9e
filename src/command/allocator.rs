//! Identifier Allocation
//!
//! Decides the oid of the operator being defined and of its commutator and
//! negator. A partner that does not exist yet is given a fresh oid and
//! materialized as a shell, so that its own define later finds and completes
//! it instead of allocating a second identifier.
//!
//! The coordinator runs in [`PipelineMode::Allocate`] and draws fresh oids
//! from an injected [`OidGenerator`]. Workers run in [`PipelineMode::Apply`]
//! with the coordinator's [`OidAssignment`]: they never allocate, and only
//! check that their own view of the catalog agrees with the assignment.

use std::sync::atomic::{AtomicU32, Ordering};
use log::error;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogError, CatalogResult, OperatorKey, OperatorRow};
use crate::common::types::{Oid, FIRST_NORMAL_OID};

/// Source of fresh identifiers
pub trait OidGenerator: Send + Sync {
    fn next_oid(&self) -> Oid;
}

/// Hands out consecutive oids, starting at FIRST_NORMAL_OID by default
#[derive(Debug)]
pub struct SequentialOidGenerator {
    next: AtomicU32,
}

impl SequentialOidGenerator {
    pub fn new(start: Oid) -> Self {
        Self {
            next: AtomicU32::new(start.max(FIRST_NORMAL_OID)),
        }
    }

    /// The oid the next call will return
    pub fn peek(&self) -> Oid {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for SequentialOidGenerator {
    fn default() -> Self {
        Self::new(FIRST_NORMAL_OID)
    }
}

impl OidGenerator for SequentialOidGenerator {
    fn next_oid(&self) -> Oid {
        // Wrap back into the normal range rather than onto reserved oids
        let oid = self.next.fetch_add(1, Ordering::SeqCst);
        if oid < FIRST_NORMAL_OID {
            self.next.store(FIRST_NORMAL_OID + 1, Ordering::SeqCst);
            return FIRST_NORMAL_OID;
        }
        oid
    }
}

/// Every identifier one command used, as sent to workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OidAssignment {
    pub operator: Oid,
    pub commutator: Option<Oid>,
    pub negator: Option<Oid>,
}

impl OidAssignment {
    pub fn for_operator(operator: Oid) -> Self {
        Self {
            operator,
            commutator: None,
            negator: None,
        }
    }
}

/// How identifiers are obtained on this node
#[derive(Clone, Copy)]
pub enum PipelineMode<'a> {
    /// Coordinator: resolve and allocate
    Allocate(&'a dyn OidGenerator),
    /// Worker: use what the coordinator decided
    Apply(&'a OidAssignment),
}

impl PipelineMode<'_> {
    pub fn is_apply(&self) -> bool {
        matches!(self, PipelineMode::Apply(_))
    }

    /// On a worker, check that the operator it found is the one the
    /// coordinator acted on
    pub fn confirm_target(&self, found: Oid) -> CatalogResult<()> {
        match self {
            PipelineMode::Allocate(_) => Ok(()),
            PipelineMode::Apply(assignment) if assignment.operator == found => Ok(()),
            PipelineMode::Apply(assignment) => Err(violation(format!(
                "coordinator acted on operator {} but this node resolved {}",
                assignment.operator, found
            ))),
        }
    }
}

/// Which link of the operator a partner fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerRole {
    Commutator,
    Negator,
}

impl PartnerRole {
    fn supplied(&self, assignment: &OidAssignment) -> Option<Oid> {
        match self {
            PartnerRole::Commutator => assignment.commutator,
            PartnerRole::Negator => assignment.negator,
        }
    }
}

/// What to do about one partner reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerPlan {
    /// No partner named
    None,
    /// The operator is its own commutator
    SelfLink,
    /// The partner exists; link to it and set its back-link
    Existing { oid: Oid },
    /// The partner does not exist; make a shell under `oid`
    Shell { oid: Oid, key: OperatorKey },
}

impl PartnerPlan {
    pub fn oid(&self, own: Oid) -> Option<Oid> {
        match self {
            PartnerPlan::None => None,
            PartnerPlan::SelfLink => Some(own),
            PartnerPlan::Existing { oid } | PartnerPlan::Shell { oid, .. } => Some(*oid),
        }
    }
}

/// A partner reference after name resolution
#[derive(Debug, Clone)]
pub struct PartnerRef {
    pub key: OperatorKey,
    pub existing: Option<OperatorRow>,
}

/// All identifier decisions for one define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPlan {
    pub own: Oid,
    /// The define completes a shell that already held `own`
    pub completes_shell: bool,
    pub commutator: PartnerPlan,
    pub negator: PartnerPlan,
}

impl IdentifierPlan {
    pub fn assignment(&self) -> OidAssignment {
        OidAssignment {
            operator: self.own,
            commutator: self.commutator.oid(self.own),
            negator: self.negator.oid(self.own),
        }
    }
}

fn violation(message: String) -> CatalogError {
    error!("protocol violation: {}", message);
    CatalogError::ProtocolViolation(message)
}

pub struct IdentifierAllocator<'a> {
    catalog: &'a Catalog,
    mode: PipelineMode<'a>,
    /// Oids handed out by this allocator and not yet written
    reserved: Vec<Oid>,
}

impl<'a> IdentifierAllocator<'a> {
    pub fn new(catalog: &'a Catalog, mode: PipelineMode<'a>) -> Self {
        Self {
            catalog,
            mode,
            reserved: Vec::new(),
        }
    }

    fn fresh_oid(&mut self, generator: &dyn OidGenerator) -> Oid {
        loop {
            let oid = generator.next_oid();
            if !self.catalog.oid_in_use(oid) && !self.reserved.contains(&oid) {
                self.reserved.push(oid);
                return oid;
            }
        }
    }

    /// A supplied oid for an object this node has to create must be unused
    fn accept_supplied(&mut self, oid: Oid, what: &str) -> CatalogResult<Oid> {
        if self.catalog.oid_in_use(oid) || self.reserved.contains(&oid) {
            return Err(violation(format!("supplied {} oid {} is already in use on this node", what, oid)));
        }
        self.reserved.push(oid);
        Ok(oid)
    }

    /// Plan identifiers for a define of `key`, whose current row (a shell, if
    /// anything) is `existing`. Partner shells get their oids before the
    /// operator itself.
    pub fn plan(
        &mut self,
        key: &OperatorKey,
        existing: Option<&OperatorRow>,
        commutator: Option<&PartnerRef>,
        negator: Option<&PartnerRef>,
    ) -> CatalogResult<IdentifierPlan> {
        let commutator_plan = self.plan_partner(key, PartnerRole::Commutator, commutator, None)?;
        let shell_key_oid = match &commutator_plan {
            PartnerPlan::Shell { oid, key } => Some((key.clone(), *oid)),
            _ => None,
        };
        let negator_plan = self.plan_partner(key, PartnerRole::Negator, negator, shell_key_oid)?;
        let (own, completes_shell) = self.plan_own(existing)?;

        let plan = IdentifierPlan {
            own,
            completes_shell,
            commutator: commutator_plan,
            negator: negator_plan,
        };

        if let PipelineMode::Apply(assignment) = self.mode {
            if plan.assignment() != *assignment {
                return Err(violation(format!(
                    "assignment {:?} does not match this node's resolution {:?}",
                    assignment,
                    plan.assignment()
                )));
            }
        }
        Ok(plan)
    }

    fn plan_own(&mut self, existing: Option<&OperatorRow>) -> CatalogResult<(Oid, bool)> {
        match (existing, self.mode) {
            (Some(shell), PipelineMode::Allocate(_)) => Ok((shell.oid(), true)),
            (Some(shell), PipelineMode::Apply(assignment)) => {
                if shell.oid() != assignment.operator {
                    return Err(violation(format!(
                        "coordinator completes operator {} but this node has a shell under {}",
                        assignment.operator,
                        shell.oid()
                    )));
                }
                Ok((shell.oid(), true))
            }
            (None, PipelineMode::Allocate(generator)) => Ok((self.fresh_oid(generator), false)),
            (None, PipelineMode::Apply(assignment)) => Ok((self.accept_supplied(assignment.operator, "operator")?, false)),
        }
    }

    fn plan_partner(
        &mut self,
        own_key: &OperatorKey,
        role: PartnerRole,
        partner: Option<&PartnerRef>,
        planned_shell: Option<(OperatorKey, Oid)>,
    ) -> CatalogResult<PartnerPlan> {
        let Some(partner) = partner else {
            if let PipelineMode::Apply(assignment) = self.mode {
                if role.supplied(assignment).is_some() {
                    return Err(violation(format!("unexpected {:?} oid in assignment", role)));
                }
            }
            return Ok(PartnerPlan::None);
        };

        if partner.key == *own_key {
            return match role {
                PartnerRole::Commutator => Ok(PartnerPlan::SelfLink),
                PartnerRole::Negator => Err(CatalogError::InvalidDefinition(
                    "operator cannot be its own negator".to_string(),
                )),
            };
        }

        if let Some(row) = &partner.existing {
            return Ok(PartnerPlan::Existing { oid: row.oid() });
        }

        // Commutator and negator naming the same missing operator share one shell
        if let Some((shell_key, oid)) = planned_shell {
            if shell_key == partner.key {
                return Ok(PartnerPlan::Shell { oid, key: shell_key });
            }
        }

        let oid = match self.mode {
            PipelineMode::Allocate(generator) => self.fresh_oid(generator),
            PipelineMode::Apply(assignment) => match role.supplied(assignment) {
                Some(oid) => self.accept_supplied(oid, "shell")?,
                None => {
                    return Err(violation(format!(
                        "{:?} {} needs a new identifier but none was supplied",
                        role, partner.key.name
                    )));
                }
            },
        };
        Ok(PartnerPlan::Shell {
            oid,
            key: partner.key.clone(),
        })
    }
}
