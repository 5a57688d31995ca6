//! Who hears about what.
//!
//! Audience rules are pure: given the order after the event was applied, they
//! list the inbox/push notices to emit. "All admins" stays symbolic here and is
//! expanded to user ids by whoever delivers the notices.

use serde::Serialize;

use courier_core::{OrderId, UserId};

use crate::order::{Order, OrderEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    AllAdmins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub recipient: Recipient,
    pub order_id: OrderId,
    pub title: String,
    pub body: String,
    /// Where the client should navigate when the notice is opened.
    pub link: String,
}

struct Builder {
    order_id: OrderId,
    notices: Vec<Notice>,
}

impl Builder {
    fn push(&mut self, recipient: Recipient, title: &str, body: String, link: String) {
        self.notices.push(Notice {
            recipient,
            order_id: self.order_id,
            title: title.to_string(),
            body,
            link,
        });
    }
}

pub fn audience_for(order: &Order, store_owner_id: UserId, event: &OrderEvent) -> Vec<Notice> {
    let id = order.header().id;
    let customer = Recipient::User(order.customer_id());
    let owner = Recipient::User(store_owner_id);
    let customer_link = format!("/orders/{id}");
    let owner_link = format!("/store-owner/orders/{id}");
    let worker_link = "/delivery/orders".to_string();
    let admin_link = "/admin/orders".to_string();

    let mut b = Builder {
        order_id: id,
        notices: Vec::new(),
    };

    match event {
        OrderEvent::Placed { header, .. } => b.push(
            owner,
            "New order",
            format!("New order #{id} worth {} is waiting for your approval.", header.grand_total),
            owner_link,
        ),
        OrderEvent::Accepted {
            preparation_time_estimate,
            ..
        } => b.push(
            customer,
            "Order accepted",
            format!(
                "Your order #{id} is being prepared, ready in about {preparation_time_estimate} minutes."
            ),
            customer_link,
        ),
        OrderEvent::Rejected { reason, .. } => b.push(
            customer,
            "Order rejected",
            format!("Your order #{id} was rejected by the store: {reason}"),
            customer_link,
        ),
        OrderEvent::MarkedReady { .. } => {
            b.push(
                customer,
                "Order ready",
                format!("Your order #{id} is ready and waiting for a courier."),
                customer_link,
            );
            b.push(
                Recipient::AllAdmins,
                "Order needs a courier",
                format!("Order #{id} is ready for delivery and needs a worker assigned."),
                admin_link,
            );
        }
        OrderEvent::WorkerAssigned { worker_id, .. } => {
            b.push(
                Recipient::User(*worker_id),
                "New delivery",
                format!("You have been assigned order #{id}."),
                worker_link,
            );
            b.push(
                customer,
                "Courier assigned",
                format!("A courier has been assigned to your order #{id}."),
                customer_link,
            );
            b.push(
                owner,
                "Courier assigned",
                format!("Order #{id} from your store has been assigned to a courier."),
                owner_link,
            );
        }
        OrderEvent::DeliveryStarted {
            estimated_arrival, ..
        } => b.push(
            customer,
            "On the way",
            format!(
                "Your order #{id} is on the way, expected at {}.",
                estimated_arrival.format("%H:%M UTC")
            ),
            customer_link,
        ),
        OrderEvent::AssignmentRejected { reason, .. } => b.push(
            Recipient::AllAdmins,
            "Assignment rejected",
            format!("The courier declined order #{id} ({reason}); it needs reassignment."),
            admin_link,
        ),
        OrderEvent::Delivered { .. } => {
            b.push(
                customer,
                "Delivered",
                format!("Your order #{id} has been delivered."),
                customer_link,
            );
            b.push(
                owner,
                "Delivered",
                format!("Order #{id} from your store has been delivered."),
                owner_link,
            );
        }
        OrderEvent::Cancelled { .. } => {
            b.push(
                customer,
                "Order cancelled",
                format!("Your order #{id} was cancelled by the administration."),
                customer_link,
            );
            b.push(
                owner,
                "Order cancelled",
                format!("Order #{id} was cancelled by the administration before you approved it."),
                owner_link,
            );
        }
        OrderEvent::ForceCancelled { worker_id, .. } => {
            b.push(
                customer,
                "Order cancelled",
                format!("Your order #{id} was cancelled by the administration for operational reasons."),
                customer_link,
            );
            if let Some(worker) = worker_id {
                b.push(
                    Recipient::User(*worker),
                    "Delivery cancelled",
                    format!("Delivery of order #{id} was cancelled by the administration."),
                    worker_link,
                );
            }
            b.push(
                owner,
                "Order cancelled",
                format!("Order #{id} from your store was cancelled during delivery."),
                owner_link,
            );
        }
    }

    b.notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use courier_auth::{Actor, Role, StoreScope};
    use courier_core::{Aggregate, AggregateRoot, Money, ProductId, StoreId};

    use crate::order::{AssignWorker, ForceCancelOrder, MarkReady, OrderCommand, OrderLine, PlaceOrder};

    fn recipients(notices: &[Notice]) -> Vec<Recipient> {
        notices.iter().map(|n| n.recipient).collect()
    }

    fn test_order(store_id: StoreId, customer: UserId) -> Order {
        let mut order = Order::empty(OrderId::new());
        order
            .execute(&OrderCommand::Place(PlaceOrder {
                order_id: *order.id(),
                customer_id: customer,
                store_id,
                lines: vec![OrderLine::new(ProductId::new(), "Tea", 1, Money::from_major(4)).unwrap()],
                delivery_fee: Money::ZERO,
                delivery_address: "1 Elm Street".into(),
                special_notes: None,
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
            }))
            .unwrap();
        order
    }

    #[test]
    fn placement_notifies_only_the_store_owner() {
        let owner = UserId::new();
        let mut order = Order::empty(OrderId::new());
        let place = PlaceOrder {
            order_id: *order.id(),
            customer_id: UserId::new(),
            store_id: StoreId::new(),
            lines: vec![OrderLine::new(ProductId::new(), "Tea", 2, Money::from_major(4)).unwrap()],
            delivery_fee: Money::from_major(1),
            delivery_address: "1 Elm Street".into(),
            special_notes: None,
            occurred_at: Utc::now(),
        };
        let events = order.execute(&OrderCommand::Place(place)).unwrap();
        let notices = audience_for(&order, owner, &events[0]);
        assert_eq!(recipients(&notices), vec![Recipient::User(owner)]);
        assert!(notices[0].body.contains("9.00"));
    }

    #[test]
    fn ready_goes_to_customer_and_admins() {
        let store_id = StoreId::new();
        let customer = UserId::new();
        let owner = Actor::new(UserId::new(), Role::StoreOwner, StoreScope::Stores([store_id].into_iter().collect()));
        let mut order = test_order(store_id, customer);
        order
            .execute(&OrderCommand::Accept(crate::order::AcceptOrder {
                actor: owner.clone(),
                preparation_minutes: 15,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let events = order
            .execute(&OrderCommand::MarkReady(MarkReady { actor: owner.clone(), occurred_at: Utc::now() }))
            .unwrap();

        assert_eq!(
            recipients(&audience_for(&order, owner.user_id, &events[0])),
            vec![Recipient::User(customer), Recipient::AllAdmins]
        );
    }

    #[test]
    fn force_cancel_includes_worker_when_assigned() {
        let store_id = StoreId::new();
        let customer = UserId::new();
        let owner = Actor::new(UserId::new(), Role::StoreOwner, StoreScope::Stores([store_id].into_iter().collect()));
        let admin = Actor::admin(UserId::new());
        let worker = UserId::new();
        let mut order = test_order(store_id, customer);
        order
            .execute(&OrderCommand::Accept(crate::order::AcceptOrder {
                actor: owner.clone(),
                preparation_minutes: 15,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order
            .execute(&OrderCommand::MarkReady(MarkReady { actor: owner.clone(), occurred_at: Utc::now() }))
            .unwrap();
        let assigned = order
            .execute(&OrderCommand::AssignWorker(AssignWorker {
                actor: admin.clone(),
                worker_id: worker,
                worker_role: Role::DeliveryWorker,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(
            recipients(&audience_for(&order, owner.user_id, &assigned[0])),
            vec![Recipient::User(worker), Recipient::User(customer), Recipient::User(owner.user_id)]
        );

        let cancelled = order
            .execute(&OrderCommand::ForceCancel(ForceCancelOrder {
                actor: admin,
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(
            recipients(&audience_for(&order, owner.user_id, &cancelled[0])),
            vec![Recipient::User(customer), Recipient::User(worker), Recipient::User(owner.user_id)]
        );
    }
}
