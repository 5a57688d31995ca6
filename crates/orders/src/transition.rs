//! The one transition table.
//!
//! Every role-gated move of an order is a row keyed by (transition, role,
//! source status). Handlers never hard-code their own checks; they ask
//! [`next_status`] and get either the target status or a typed rejection.

use serde::Serialize;

use courier_auth::Role;
use courier_core::DomainError;

use crate::status::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Accept,
    Reject,
    MarkReady,
    AssignWorker,
    StartDelivery,
    RejectAssignment,
    MarkDelivered,
    Cancel,
    ForceCancel,
}

impl Transition {
    pub const ALL: [Transition; 9] = [
        Transition::Accept,
        Transition::Reject,
        Transition::MarkReady,
        Transition::AssignWorker,
        Transition::StartDelivery,
        Transition::RejectAssignment,
        Transition::MarkDelivered,
        Transition::Cancel,
        Transition::ForceCancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::MarkReady => "mark_ready",
            Transition::AssignWorker => "assign_worker",
            Transition::StartDelivery => "start_delivery",
            Transition::RejectAssignment => "reject_assignment",
            Transition::MarkDelivered => "mark_delivered",
            Transition::Cancel => "cancel",
            Transition::ForceCancel => "force_cancel",
        }
    }
}

struct Rule {
    transition: Transition,
    roles: &'static [Role],
    from: &'static [OrderStatus],
    to: OrderStatus,
}

use OrderStatus::*;

const RULES: &[Rule] = &[
    Rule {
        transition: Transition::Accept,
        roles: &[Role::StoreOwner],
        from: &[Waiting],
        to: Preparing,
    },
    Rule {
        transition: Transition::Reject,
        roles: &[Role::StoreOwner],
        from: &[Waiting],
        to: Rejected,
    },
    Rule {
        transition: Transition::MarkReady,
        roles: &[Role::StoreOwner],
        from: &[Preparing],
        to: ReadyForDelivery,
    },
    Rule {
        transition: Transition::AssignWorker,
        roles: &[Role::Admin, Role::BranchManager],
        from: &[ReadyForDelivery],
        to: AssignedForDelivery,
    },
    Rule {
        transition: Transition::StartDelivery,
        roles: &[Role::DeliveryWorker],
        from: &[AssignedForDelivery],
        to: OutForDelivery,
    },
    Rule {
        transition: Transition::RejectAssignment,
        roles: &[Role::DeliveryWorker],
        from: &[AssignedForDelivery],
        to: ReadyForDelivery,
    },
    Rule {
        transition: Transition::MarkDelivered,
        roles: &[Role::DeliveryWorker],
        from: &[OutForDelivery],
        to: Delivered,
    },
    Rule {
        transition: Transition::Cancel,
        roles: &[Role::Admin],
        from: &[Waiting],
        to: CancelledByAdmin,
    },
    Rule {
        transition: Transition::ForceCancel,
        roles: &[Role::Admin, Role::BranchManager],
        from: &[ReadyForDelivery, AssignedForDelivery, OutForDelivery],
        to: CancelledByAdmin,
    },
];

// RULES is ordered like the Transition variants.
fn rule(transition: Transition) -> &'static Rule {
    &RULES[transition as usize]
}

/// Why the table refused a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    /// The role may never perform this transition.
    RoleNotPermitted { role: Role, transition: Transition },
    /// The role may, but not from the current status.
    WrongState {
        current: OrderStatus,
        transition: Transition,
    },
}

impl From<TransitionRejection> for DomainError {
    fn from(value: TransitionRejection) -> Self {
        match value {
            TransitionRejection::RoleNotPermitted { .. } => DomainError::Unauthorized,
            TransitionRejection::WrongState { current, transition } => {
                let expected: Vec<&str> = valid_sources(transition).iter().map(|s| s.as_str()).collect();
                DomainError::precondition(
                    current.as_str(),
                    format!(
                        "{} requires status {}",
                        transition.as_str(),
                        expected.join(" or ")
                    ),
                )
            }
        }
    }
}

pub fn permits(role: Role, transition: Transition) -> bool {
    rule(transition).roles.contains(&role)
}

pub fn valid_sources(transition: Transition) -> &'static [OrderStatus] {
    rule(transition).from
}

/// Look up the target status of `transition` for `role` from `current`.
pub fn next_status(
    current: OrderStatus,
    role: Role,
    transition: Transition,
) -> Result<OrderStatus, TransitionRejection> {
    let rule = rule(transition);
    if !rule.roles.contains(&role) {
        return Err(TransitionRejection::RoleNotPermitted { role, transition });
    }
    if !rule.from.contains(&current) {
        return Err(TransitionRejection::WrongState { current, transition });
    }
    Ok(rule.to)
}
