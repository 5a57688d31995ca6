use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_auth::{Actor, Role};
use courier_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, Money, OrderId, ProductId, StoreId, UserId,
};

use crate::status::OrderStatus;
use crate::transition::{self, Transition};

/// Reason recorded when an admin cancels an order the store never accepted.
pub const ADMIN_CANCEL_REASON: &str = "cancelled by admin before store approval";
/// Prefix of every forced-cancellation reason.
pub const FORCE_CANCEL_PREFIX: &str = "(forced admin cancellation): ";
/// Reason recorded for a forced cancellation without free text.
pub const FORCE_CANCEL_DEFAULT_REASON: &str =
    "forcibly cancelled by administration during the delivery stage";

/// Order line: product, quantity, unit price frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_subtotal: Money,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price.is_negative() {
            return Err(DomainError::validation("unit_price must not be negative"));
        }
        Ok(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            line_subtotal: unit_price.checked_mul(quantity)?,
        })
    }
}

/// Stock to take from (on placement) or give back to (on restock) a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub quantity: u32,
}

fn movements(lines: &[OrderLine]) -> Vec<StockMovement> {
    lines
        .iter()
        .map(|l| StockMovement {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect()
}

/// The persisted order row.
///
/// Read access is public; changes only happen through [`Order`] commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: OrderId,
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub delivery_worker_id: Option<UserId>,
    pub status: OrderStatus,
    pub items_subtotal: Money,
    pub delivery_fee: Money,
    pub grand_total: Money,
    pub delivery_address: String,
    pub special_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub delivery_worker_rejection_reason: Option<String>,
    /// Minutes, set when the store accepts.
    pub preparation_time_estimate: Option<u32>,
    pub placed_at: DateTime<Utc>,
    /// Set on the first entry into `ready_for_delivery`, never afterwards.
    pub made_ready_at: Option<DateTime<Utc>>,
    pub delivery_estimated_at: Option<DateTime<Utc>>,
    pub last_status_update_at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    #[serde(flatten)]
    header: OrderHeader,
    lines: Vec<OrderLine>,
    #[serde(skip)]
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            header: OrderHeader {
                id,
                customer_id: UserId::from_uuid(Uuid::nil()),
                store_id: StoreId::from_uuid(Uuid::nil()),
                delivery_worker_id: None,
                status: OrderStatus::Waiting,
                items_subtotal: Money::ZERO,
                delivery_fee: Money::ZERO,
                grand_total: Money::ZERO,
                delivery_address: String::new(),
                special_notes: None,
                rejection_reason: None,
                delivery_worker_rejection_reason: None,
                preparation_time_estimate: None,
                placed_at: DateTime::<Utc>::UNIX_EPOCH,
                made_ready_at: None,
                delivery_estimated_at: None,
                last_status_update_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            lines: Vec::new(),
            created: false,
        }
    }

    /// Rebuild a placed order from storage, re-checking the money invariant.
    pub fn from_parts(header: OrderHeader, lines: Vec<OrderLine>) -> DomainResult<Self> {
        if header.items_subtotal.checked_add(header.delivery_fee)? != header.grand_total {
            return Err(DomainError::invariant(format!(
                "order {}: grand_total != items_subtotal + delivery_fee",
                header.id
            )));
        }
        if !lines.is_empty() && Money::sum(lines.iter().map(|l| l.line_subtotal))? != header.items_subtotal {
            return Err(DomainError::invariant(format!(
                "order {}: line subtotals do not add up to items_subtotal",
                header.id
            )));
        }
        Ok(Self {
            header,
            lines,
            created: true,
        })
    }

    pub fn header(&self) -> &OrderHeader {
        &self.header
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn status(&self) -> OrderStatus {
        self.header.status
    }

    pub fn customer_id(&self) -> UserId {
        self.header.customer_id
    }

    pub fn store_id(&self) -> StoreId {
        self.header.store_id
    }

    pub fn delivery_worker_id(&self) -> Option<UserId> {
        self.header.delivery_worker_id
    }

    pub fn made_ready_at(&self) -> Option<DateTime<Utc>> {
        self.header.made_ready_at
    }

    pub fn grand_total(&self) -> Money {
        self.header.grand_total
    }

    /// Whether `actor` may see this order at all.
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Customer => self.header.customer_id == actor.user_id,
            Role::DeliveryWorker => self.header.delivery_worker_id == Some(actor.user_id),
            Role::StoreOwner | Role::BranchManager | Role::Admin => {
                actor.has_scope_over(self.header.store_id)
            }
        }
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.header.id
    }
}

/// Command: PlaceOrder. Built by [`crate::placement::plan_placement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub lines: Vec<OrderLine>,
    pub delivery_fee: Money,
    pub delivery_address: String,
    pub special_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: the store accepts and starts preparing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOrder {
    pub actor: Actor,
    pub preparation_minutes: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectOrder {
    pub actor: Actor,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkReady {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: hand the order to a delivery worker.
///
/// `worker_role` is the role the directory reports for `worker_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignWorker {
    pub actor: Actor,
    pub worker_id: UserId,
    pub worker_role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartDelivery {
    pub actor: Actor,
    pub estimated_arrival: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectAssignment {
    pub actor: Actor,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkDelivered {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: admin cancels an order still waiting for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrder {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: cancel an order already handed over for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceCancelOrder {
    pub actor: Actor,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCommand {
    Place(PlaceOrder),
    Accept(AcceptOrder),
    Reject(RejectOrder),
    MarkReady(MarkReady),
    AssignWorker(AssignWorker),
    StartDelivery(StartDelivery),
    RejectAssignment(RejectAssignment),
    MarkDelivered(MarkDelivered),
    Cancel(CancelOrder),
    ForceCancel(ForceCancelOrder),
}

impl OrderCommand {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderCommand::Place(c) => c.occurred_at,
            OrderCommand::Accept(c) => c.occurred_at,
            OrderCommand::Reject(c) => c.occurred_at,
            OrderCommand::MarkReady(c) => c.occurred_at,
            OrderCommand::AssignWorker(c) => c.occurred_at,
            OrderCommand::StartDelivery(c) => c.occurred_at,
            OrderCommand::RejectAssignment(c) => c.occurred_at,
            OrderCommand::MarkDelivered(c) => c.occurred_at,
            OrderCommand::Cancel(c) => c.occurred_at,
            OrderCommand::ForceCancel(c) => c.occurred_at,
        }
    }
}

/// What happened to an order, including the side effects the store must apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed {
        header: OrderHeader,
        lines: Vec<OrderLine>,
        /// Stock to decrement.
        reserve: Vec<StockMovement>,
    },
    Accepted {
        preparation_time_estimate: u32,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
        restock: Vec<StockMovement>,
        occurred_at: DateTime<Utc>,
    },
    MarkedReady {
        occurred_at: DateTime<Utc>,
    },
    WorkerAssigned {
        worker_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    DeliveryStarted {
        estimated_arrival: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    AssignmentRejected {
        worker_id: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Delivered {
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        reason: String,
        restock: Vec<StockMovement>,
        occurred_at: DateTime<Utc>,
    },
    ForceCancelled {
        reason: String,
        worker_id: Option<UserId>,
        occurred_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed { .. } => "order.placed",
            OrderEvent::Accepted { .. } => "order.accepted",
            OrderEvent::Rejected { .. } => "order.rejected",
            OrderEvent::MarkedReady { .. } => "order.marked_ready",
            OrderEvent::WorkerAssigned { .. } => "order.worker_assigned",
            OrderEvent::DeliveryStarted { .. } => "order.delivery_started",
            OrderEvent::AssignmentRejected { .. } => "order.assignment_rejected",
            OrderEvent::Delivered { .. } => "order.delivered",
            OrderEvent::Cancelled { .. } => "order.cancelled",
            OrderEvent::ForceCancelled { .. } => "order.force_cancelled",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed { header, .. } => header.placed_at,
            OrderEvent::Accepted { occurred_at, .. }
            | OrderEvent::Rejected { occurred_at, .. }
            | OrderEvent::MarkedReady { occurred_at }
            | OrderEvent::WorkerAssigned { occurred_at, .. }
            | OrderEvent::DeliveryStarted { occurred_at, .. }
            | OrderEvent::AssignmentRejected { occurred_at, .. }
            | OrderEvent::Delivered { occurred_at }
            | OrderEvent::Cancelled { occurred_at, .. }
            | OrderEvent::ForceCancelled { occurred_at, .. } => *occurred_at,
        }
    }

    /// Signed stock change per product: negative on placement, positive on restock.
    pub fn stock_delta(&self) -> Vec<(ProductId, i64)> {
        match self {
            OrderEvent::Placed { reserve, .. } => reserve
                .iter()
                .map(|m| (m.product_id, -i64::from(m.quantity)))
                .collect(),
            OrderEvent::Rejected { restock, .. } | OrderEvent::Cancelled { restock, .. } => restock
                .iter()
                .map(|m| (m.product_id, i64::from(m.quantity)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        if let OrderEvent::Placed { header, lines, .. } = event {
            self.header = header.clone();
            self.lines = lines.clone();
            self.created = true;
            return;
        }

        let h = &mut self.header;
        match event {
            OrderEvent::Placed { .. } => {}
            OrderEvent::Accepted {
                preparation_time_estimate,
                ..
            } => {
                h.status = OrderStatus::Preparing;
                h.preparation_time_estimate = Some(*preparation_time_estimate);
            }
            OrderEvent::Rejected { reason, .. } => {
                h.status = OrderStatus::Rejected;
                h.rejection_reason = Some(reason.clone());
            }
            OrderEvent::MarkedReady { occurred_at } => {
                h.status = OrderStatus::ReadyForDelivery;
                h.made_ready_at.get_or_insert(*occurred_at);
            }
            OrderEvent::WorkerAssigned { worker_id, .. } => {
                h.status = OrderStatus::AssignedForDelivery;
                h.delivery_worker_id = Some(*worker_id);
            }
            OrderEvent::DeliveryStarted {
                estimated_arrival, ..
            } => {
                h.status = OrderStatus::OutForDelivery;
                h.delivery_estimated_at = Some(*estimated_arrival);
            }
            OrderEvent::AssignmentRejected { reason, .. } => {
                // Back to the pool; made_ready_at stays as first set.
                h.status = OrderStatus::ReadyForDelivery;
                h.delivery_worker_id = None;
                h.delivery_estimated_at = None;
                h.delivery_worker_rejection_reason = Some(reason.clone());
            }
            OrderEvent::Delivered { .. } => {
                h.status = OrderStatus::Delivered;
            }
            OrderEvent::Cancelled { reason, .. } | OrderEvent::ForceCancelled { reason, .. } => {
                h.status = OrderStatus::CancelledByAdmin;
                h.rejection_reason = Some(reason.clone());
            }
        }
        h.last_status_update_at = event.occurred_at();
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let event = match command {
            OrderCommand::Place(cmd) => return self.handle_place(cmd),
            _ if !self.created => return Err(DomainError::not_found()),
            OrderCommand::Accept(cmd) => self.handle_accept(cmd)?,
            OrderCommand::Reject(cmd) => self.handle_reject(cmd)?,
            OrderCommand::MarkReady(cmd) => {
                self.authorize(&cmd.actor, Transition::MarkReady)?;
                OrderEvent::MarkedReady {
                    occurred_at: cmd.occurred_at,
                }
            }
            OrderCommand::AssignWorker(cmd) => self.handle_assign(cmd)?,
            OrderCommand::StartDelivery(cmd) => {
                self.authorize(&cmd.actor, Transition::StartDelivery)?;
                OrderEvent::DeliveryStarted {
                    estimated_arrival: cmd.estimated_arrival,
                    occurred_at: cmd.occurred_at,
                }
            }
            OrderCommand::RejectAssignment(cmd) => self.handle_reject_assignment(cmd)?,
            OrderCommand::MarkDelivered(cmd) => {
                self.authorize(&cmd.actor, Transition::MarkDelivered)?;
                OrderEvent::Delivered {
                    occurred_at: cmd.occurred_at,
                }
            }
            OrderCommand::Cancel(cmd) => {
                self.authorize(&cmd.actor, Transition::Cancel)?;
                OrderEvent::Cancelled {
                    reason: ADMIN_CANCEL_REASON.to_string(),
                    restock: movements(&self.lines),
                    occurred_at: cmd.occurred_at,
                }
            }
            OrderCommand::ForceCancel(cmd) => self.handle_force_cancel(cmd)?,
        };
        Ok(vec![event])
    }
}

fn required_text(value: &str, field: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

impl Order {
    /// Role gate, then scope, then source status. Each failure leaves the order untouched.
    fn authorize(&self, actor: &Actor, t: Transition) -> DomainResult<OrderStatus> {
        if !transition::permits(actor.role, t) {
            return Err(DomainError::Unauthorized);
        }
        self.ensure_scope(actor)?;
        Ok(transition::next_status(self.header.status, actor.role, t)?)
    }

    fn ensure_scope(&self, actor: &Actor) -> DomainResult<()> {
        if self.is_visible_to(actor) {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> DomainResult<Vec<OrderEvent>> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("an order needs at least one line"));
        }
        let delivery_address = required_text(&cmd.delivery_address, "delivery_address")?;
        if cmd.delivery_fee.is_negative() {
            return Err(DomainError::validation("delivery_fee must not be negative"));
        }
        for line in &cmd.lines {
            let expected = OrderLine::new(line.product_id, "", line.quantity, line.unit_price)?;
            if expected.line_subtotal != line.line_subtotal {
                return Err(DomainError::invariant(format!(
                    "line subtotal for product {} does not match quantity * unit_price",
                    line.product_id
                )));
            }
        }

        let items_subtotal = Money::sum(cmd.lines.iter().map(|l| l.line_subtotal))?;
        let grand_total = items_subtotal.checked_add(cmd.delivery_fee)?;
        let special_notes = cmd
            .special_notes
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let header = OrderHeader {
            id: cmd.order_id,
            customer_id: cmd.customer_id,
            store_id: cmd.store_id,
            delivery_worker_id: None,
            status: OrderStatus::Waiting,
            items_subtotal,
            delivery_fee: cmd.delivery_fee,
            grand_total,
            delivery_address,
            special_notes,
            rejection_reason: None,
            delivery_worker_rejection_reason: None,
            preparation_time_estimate: None,
            placed_at: cmd.occurred_at,
            made_ready_at: None,
            delivery_estimated_at: None,
            last_status_update_at: cmd.occurred_at,
        };

        Ok(vec![OrderEvent::Placed {
            header,
            reserve: movements(&cmd.lines),
            lines: cmd.lines.clone(),
        }])
    }

    fn handle_accept(&self, cmd: &AcceptOrder) -> DomainResult<OrderEvent> {
        let minutes = u32::try_from(cmd.preparation_minutes)
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| {
                DomainError::validation("preparation_time_estimate must be a positive number of minutes")
            })?;
        self.authorize(&cmd.actor, Transition::Accept)?;
        Ok(OrderEvent::Accepted {
            preparation_time_estimate: minutes,
            occurred_at: cmd.occurred_at,
        })
    }

    fn handle_reject(&self, cmd: &RejectOrder) -> DomainResult<OrderEvent> {
        let reason = required_text(&cmd.reason, "rejection_reason")?;
        self.authorize(&cmd.actor, Transition::Reject)?;
        Ok(OrderEvent::Rejected {
            reason,
            restock: movements(&self.lines),
            occurred_at: cmd.occurred_at,
        })
    }

    fn handle_assign(&self, cmd: &AssignWorker) -> DomainResult<OrderEvent> {
        if cmd.worker_role != Role::DeliveryWorker {
            return Err(DomainError::validation(format!(
                "user {} is not a delivery worker",
                cmd.worker_id
            )));
        }
        self.authorize(&cmd.actor, Transition::AssignWorker)?;
        Ok(OrderEvent::WorkerAssigned {
            worker_id: cmd.worker_id,
            occurred_at: cmd.occurred_at,
        })
    }

    fn handle_reject_assignment(&self, cmd: &RejectAssignment) -> DomainResult<OrderEvent> {
        let reason = required_text(&cmd.reason, "reason")?;
        self.authorize(&cmd.actor, Transition::RejectAssignment)?;
        Ok(OrderEvent::AssignmentRejected {
            worker_id: cmd.actor.user_id,
            reason,
            occurred_at: cmd.occurred_at,
        })
    }

    fn handle_force_cancel(&self, cmd: &ForceCancelOrder) -> DomainResult<OrderEvent> {
        self.authorize(&cmd.actor, Transition::ForceCancel)?;
        let reason = match cmd.reason.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => format!("{FORCE_CANCEL_PREFIX}{text}"),
            _ => FORCE_CANCEL_DEFAULT_REASON.to_string(),
        };
        Ok(OrderEvent::ForceCancelled {
            reason,
            worker_id: self.header.delivery_worker_id,
            occurred_at: cmd.occurred_at,
        })
    }
}
