//! Routing engine: decides who holds the turn.
//!
//! Everything here is a pure function of the workflow type and the recipient
//! statuses. There is no step counter; "who is active" is always derived by
//! scanning statuses, and [`RoutingEngine::active_set`] is the only place that
//! derivation lives.

use envelope_types::{Recipient, RecipientId, RecipientRole, RecipientStatus, WorkflowType};
use std::cmp::Ordering;

/// Two or more recipients share an `order` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub order: u32,
    /// Tied recipients in the order they will be routed.
    pub recipients: Vec<RecipientId>,
}

/// Result of evaluating the directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingPlan {
    /// Pending actionable recipients that should move to `SENT`.
    pub activate: Vec<RecipientId>,
    /// Pending CC recipients that should be copied in.
    pub notify_cc: Vec<RecipientId>,
    /// Every actionable recipient succeeded.
    pub complete: bool,
    pub warnings: Vec<IntegrityWarning>,
}

impl RoutingPlan {
    pub fn is_idle(&self) -> bool {
        self.activate.is_empty() && self.notify_cc.is_empty() && !self.complete
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RoutingEngine {
    workflow: WorkflowType,
}

impl RoutingEngine {
    pub fn new(workflow: WorkflowType) -> Self {
        Self { workflow }
    }

    pub fn workflow(&self) -> WorkflowType {
        self.workflow
    }

    /// Recipients currently holding the turn.
    ///
    /// Sequential envelopes report at most one: the first active actionable
    /// recipient in routing order.
    pub fn active_set(&self, recipients: &[Recipient]) -> Vec<RecipientId> {
        let active = routing_order(recipients)
            .into_iter()
            .filter(|r| r.role.is_actionable() && r.status.is_active())
            .map(|r| r.id);
        match self.workflow {
            WorkflowType::Sequential => active.take(1).collect(),
            WorkflowType::Parallel => active.collect(),
        }
    }

    pub fn is_active(&self, recipients: &[Recipient], id: RecipientId) -> bool {
        self.active_set(recipients).contains(&id)
    }

    /// Compute the next activations for the directory as it stands.
    pub fn plan(&self, recipients: &[Recipient]) -> RoutingPlan {
        let mut plan = match self.workflow {
            WorkflowType::Sequential => RoutingPlan {
                warnings: order_warnings(recipients),
                ..plan_sequential(recipients)
            },
            WorkflowType::Parallel => plan_parallel(recipients),
        };
        plan.complete = is_complete(recipients);
        plan
    }
}

/// True iff there is at least one signer and every actionable recipient
/// reached a success status.
pub fn is_complete(recipients: &[Recipient]) -> bool {
    let has_signer = recipients
        .iter()
        .any(|r| r.role == RecipientRole::Signer);
    has_signer
        && recipients
            .iter()
            .filter(|r| r.role.is_actionable())
            .all(|r| r.status.is_success())
}

/// Recipients sorted by `(order, id)`; the id comparison is lexicographic on
/// the canonical string form.
pub fn routing_order(recipients: &[Recipient]) -> Vec<&Recipient> {
    let mut ordered: Vec<&Recipient> = recipients.iter().collect();
    ordered.sort_by(|a, b| compare_routing(a, b));
    ordered
}

fn compare_routing(a: &Recipient, b: &Recipient) -> Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
}

fn plan_sequential(recipients: &[Recipient]) -> RoutingPlan {
    let ordered = routing_order(recipients);
    let actionable: Vec<&Recipient> = ordered
        .iter()
        .copied()
        .filter(|r| r.role.is_actionable())
        .collect();

    let mut plan = RoutingPlan::default();

    // How far routing has reached; CCs at or before it get copied in.
    let frontier = if let Some(active) = actionable.iter().find(|r| r.status.is_active()) {
        Some(active.order)
    } else {
        match actionable.iter().find(|r| !r.status.is_success()) {
            Some(next) if next.status == RecipientStatus::Pending => {
                plan.activate.push(next.id);
                Some(next.order)
            }
            // Declined or expired: routing is blocked here.
            Some(blocked) => Some(blocked.order),
            None => None,
        }
    };

    plan.notify_cc = ordered
        .iter()
        .filter(|r| r.role == RecipientRole::Cc && r.status == RecipientStatus::Pending)
        .filter(|r| frontier.map(|f| r.order <= f).unwrap_or(true))
        .map(|r| r.id)
        .collect();

    plan
}

fn plan_parallel(recipients: &[Recipient]) -> RoutingPlan {
    let mut plan = RoutingPlan::default();
    for r in routing_order(recipients) {
        if r.status != RecipientStatus::Pending {
            continue;
        }
        if r.role.is_actionable() {
            plan.activate.push(r.id);
        } else {
            plan.notify_cc.push(r.id);
        }
    }
    plan
}

fn order_warnings(recipients: &[Recipient]) -> Vec<IntegrityWarning> {
    let ordered = routing_order(recipients);
    let mut warnings: Vec<IntegrityWarning> = Vec::new();
    for pair in ordered.windows(2) {
        if pair[0].order != pair[1].order {
            continue;
        }
        match warnings.last_mut() {
            Some(w) if w.order == pair[0].order => w.recipients.push(pair[1].id),
            _ => warnings.push(IntegrityWarning {
                order: pair[0].order,
                recipients: vec![pair[0].id, pair[1].id],
            }),
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use envelope_types::NewRecipient;
    use proptest::prelude::*;

    fn recipient(order: u32, role: RecipientRole) -> Recipient {
        Recipient::new(NewRecipient {
            order,
            role,
            name: format!("r{}", order),
            email: format!("r{}@example.com", order),
        })
    }

    #[test]
    fn sequential_activates_lowest_order_first() {
        let rs = vec![
            recipient(2, RecipientRole::Signer),
            recipient(1, RecipientRole::Signer),
        ];
        let plan = RoutingEngine::new(WorkflowType::Sequential).plan(&rs);
        assert_eq!(plan.activate, vec![rs[1].id]);
        assert!(!plan.complete);
    }

    #[test]
    fn sequential_waits_for_active_recipient() {
        let mut rs = vec![
            recipient(1, RecipientRole::Signer),
            recipient(2, RecipientRole::Signer),
        ];
        rs[0].status = RecipientStatus::Opened;
        let engine = RoutingEngine::new(WorkflowType::Sequential);
        assert!(engine.plan(&rs).activate.is_empty());
        assert_eq!(engine.active_set(&rs), vec![rs[0].id]);

        rs[0].status = RecipientStatus::Signed;
        assert_eq!(engine.plan(&rs).activate, vec![rs[1].id]);
    }

    #[test]
    fn sequential_blocks_behind_declined_recipient() {
        let mut rs = vec![
            recipient(1, RecipientRole::Approver),
            recipient(2, RecipientRole::Signer),
        ];
        rs[0].status = RecipientStatus::Expired;
        let plan = RoutingEngine::new(WorkflowType::Sequential).plan(&rs);
        assert!(plan.activate.is_empty());
        assert!(!plan.complete);
    }

    #[test]
    fn cc_is_copied_when_frontier_passes_it() {
        let mut rs = vec![
            recipient(1, RecipientRole::Signer),
            recipient(2, RecipientRole::Cc),
            recipient(3, RecipientRole::Signer),
        ];
        let engine = RoutingEngine::new(WorkflowType::Sequential);
        let plan = engine.plan(&rs);
        assert_eq!(plan.activate, vec![rs[0].id]);
        assert!(plan.notify_cc.is_empty());

        rs[0].status = RecipientStatus::Signed;
        let plan = engine.plan(&rs);
        assert_eq!(plan.activate, vec![rs[2].id]);
        assert_eq!(plan.notify_cc, vec![rs[1].id]);
    }

    #[test]
    fn cc_never_blocks_completion() {
        let mut rs = vec![
            recipient(1, RecipientRole::Signer),
            recipient(2, RecipientRole::Cc),
        ];
        rs[0].status = RecipientStatus::Signed;
        let plan = RoutingEngine::new(WorkflowType::Sequential).plan(&rs);
        assert!(plan.complete);
        assert_eq!(plan.notify_cc, vec![rs[1].id]);
    }

    #[test]
    fn parallel_activates_every_actionable_recipient() {
        let rs = vec![
            recipient(0, RecipientRole::Signer),
            recipient(0, RecipientRole::Signer),
            recipient(0, RecipientRole::Approver),
            recipient(0, RecipientRole::Cc),
        ];
        let engine = RoutingEngine::new(WorkflowType::Parallel);
        let plan = engine.plan(&rs);
        assert_eq!(plan.activate.len(), 3);
        assert_eq!(plan.notify_cc, vec![rs[3].id]);
    }

    #[test]
    fn tied_orders_break_on_identifier_and_warn() {
        let rs = vec![
            recipient(1, RecipientRole::Signer),
            recipient(1, RecipientRole::Signer),
        ];
        let expected = if rs[0].id.to_string() < rs[1].id.to_string() {
            rs[0].id
        } else {
            rs[1].id
        };
        let plan = RoutingEngine::new(WorkflowType::Sequential).plan(&rs);
        assert_eq!(plan.activate, vec![expected]);
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].recipients.len(), 2);
    }

    #[test]
    fn completion_requires_a_signer() {
        let mut rs = vec![recipient(1, RecipientRole::Approver)];
        rs[0].status = RecipientStatus::Approved;
        assert!(!is_complete(&rs));
    }

    #[test]
    fn sequential_active_set_reports_single_recipient() {
        let mut rs = vec![
            recipient(1, RecipientRole::Signer),
            recipient(2, RecipientRole::Signer),
        ];
        // Corrupt directory: two active at once. Only the first holds the turn.
        rs[0].status = RecipientStatus::Sent;
        rs[1].status = RecipientStatus::Sent;
        let engine = RoutingEngine::new(WorkflowType::Sequential);
        assert_eq!(engine.active_set(&rs), vec![rs[0].id]);
        assert!(!engine.is_active(&rs, rs[1].id));
    }

    proptest! {
        /// Driving a sequential directory to completion never activates
        /// order n+1 while order n is unfinished.
        #[test]
        fn sequential_never_skips_ahead(orders in prop::collection::vec(0u32..20, 1..8)) {
            let mut rs: Vec<Recipient> = orders
                .iter()
                .map(|o| recipient(*o, RecipientRole::Signer))
                .collect();
            let engine = RoutingEngine::new(WorkflowType::Sequential);

            for _ in 0..rs.len() + 1 {
                let plan = engine.plan(&rs);
                prop_assert!(plan.activate.len() <= 1);
                for id in &plan.activate {
                    let me = rs.iter().find(|r| r.id == *id).unwrap().clone();
                    for other in &rs {
                        if compare_routing(other, &me) == Ordering::Less {
                            prop_assert!(other.status.is_success());
                        }
                    }
                    let r = rs.iter_mut().find(|r| r.id == *id).unwrap();
                    r.status = RecipientStatus::Signed;
                }
                if plan.complete {
                    break;
                }
            }
            prop_assert!(is_complete(&rs));
        }
    }
}
