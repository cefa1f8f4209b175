use chrono::Utc;
use mercato_order::{FulfillmentAction, MerchantSubOrder, ShipmentDetails, SubOrder, SubOrderTransition, TransitionOutcome};
use mercato_shared::events::{MarketplaceEvent, SubOrderStatusChangedEvent};
use std::sync::Arc;
use uuid::Uuid;

use crate::notify::{NotificationRequest, NotificationService};
use crate::repository::OrderRepository;
use crate::{CoreError, CoreResult, MerchantActor};

/// Drives the per-merchant sub-order lifecycle.
#[derive(Clone)]
pub struct FulfillmentService {
    orders: Arc<dyn OrderRepository>,
    notifications: NotificationService,
}

impl FulfillmentService {
    pub fn new(orders: Arc<dyn OrderRepository>, notifications: NotificationService) -> Self {
        Self { orders, notifications }
    }

    /// Apply `action` to a sub-order owned by `actor`.
    ///
    /// A disallowed action is not an error: it comes back as
    /// `TransitionOutcome::InvalidTransition` and nothing is written.
    pub async fn transition(
        &self,
        actor: MerchantActor,
        sub_order_id: Uuid,
        action: FulfillmentAction,
        shipment: ShipmentDetails,
    ) -> CoreResult<TransitionOutcome> {
        let sub_order = self.owned_sub_order(actor, sub_order_id).await?;

        let transition = match SubOrderTransition::plan(&sub_order, action, shipment, Utc::now()) {
            Ok(transition) => transition,
            Err(outcome) => {
                tracing::warn!(%sub_order_id, from = %sub_order.status, %action, "Rejected sub-order transition");
                return Ok(outcome);
            }
        };

        if !self.orders.apply_transition(&transition).await? {
            // Someone else moved the sub-order between our read and our write.
            let current = self
                .orders
                .get_sub_order(sub_order_id)
                .await?
                .map(|s| s.status)
                .unwrap_or(sub_order.status);
            tracing::warn!(%sub_order_id, from = %current, %action, "Sub-order transition lost a race");
            return Ok(TransitionOutcome::InvalidTransition { from: current, attempted: action });
        }

        tracing::info!(
            %sub_order_id,
            sub_order_number = %sub_order.sub_order_number,
            from = %transition.from,
            to = %transition.to,
            "Sub-order status changed"
        );
        self.announce(&sub_order, &transition).await;

        Ok(transition.outcome())
    }

    pub async fn list_for_merchant(&self, actor: MerchantActor, paid_only: bool) -> CoreResult<Vec<MerchantSubOrder>> {
        Ok(self.orders.list_merchant_sub_orders(actor.merchant_id, paid_only).await?)
    }

    pub async fn get_for_merchant(&self, actor: MerchantActor, sub_order_id: Uuid) -> CoreResult<MerchantSubOrder> {
        let view = self
            .orders
            .get_merchant_sub_order(sub_order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Sub-order {}", sub_order_id)))?;
        if view.sub_order.merchant_id != actor.merchant_id {
            return Err(CoreError::Forbidden("sub-order belongs to another merchant".to_string()));
        }
        Ok(view)
    }

    async fn owned_sub_order(&self, actor: MerchantActor, sub_order_id: Uuid) -> CoreResult<SubOrder> {
        let sub_order = self
            .orders
            .get_sub_order(sub_order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Sub-order {}", sub_order_id)))?;
        if sub_order.merchant_id != actor.merchant_id {
            tracing::warn!(%sub_order_id, merchant_id = %actor.merchant_id, "Merchant tried to act on a foreign sub-order");
            return Err(CoreError::Forbidden("sub-order belongs to another merchant".to_string()));
        }
        Ok(sub_order)
    }

    async fn announce(&self, sub_order: &SubOrder, transition: &SubOrderTransition) {
        self.notifications
            .publish(MarketplaceEvent::SubOrderStatusChanged(SubOrderStatusChangedEvent {
                sub_order_id: sub_order.id,
                sub_order_number: sub_order.sub_order_number.clone(),
                order_id: sub_order.order_id,
                merchant_id: sub_order.merchant_id,
                from: transition.from.to_string(),
                to: transition.to.to_string(),
                timestamp: transition.at.timestamp(),
            }))
            .await;

        let customer_id = match self.orders.get_order(sub_order.order_id).await {
            Ok(Some(order)) => order.order.customer_id,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(order_id = %sub_order.order_id, "Failed to load order for notification: {}", e);
                return;
            }
        };

        let (title, message) = match transition.action {
            FulfillmentAction::Accept => ("Order Accepted", "is being prepared by the seller"),
            FulfillmentAction::Reject => ("Order Cancelled", "was cancelled by the seller"),
            FulfillmentAction::Ship => ("Order Shipped", "is on its way"),
            FulfillmentAction::Deliver => ("Order Delivered", "has been delivered"),
        };
        let mut message = format!("Your order {} {}.", sub_order.sub_order_number, message);
        if let Some(tracking) = &transition.shipment.tracking_number {
            message.push_str(&format!(" Tracking number: {}", tracking));
        }

        self.notifications
            .notify_quietly(
                NotificationRequest::new(customer_id, title, message, "order")
                    .with_action_url(format!("/orders/{}", sub_order.order_id)),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutService;
    use crate::memory::InMemoryStore;
    use crate::repository::NotificationRepository;
    use crate::testing;
    use mercato_order::{PaymentStatus, SubOrderStatus};

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: FulfillmentService,
        merchant: MerchantActor,
        customer: Uuid,
        order_id: Uuid,
        sub_order_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = testing::store();
        let merchant = testing::merchant(&store, "North Loom").await;
        let product = testing::product(&store, merchant.merchant_id, "Throw Blanket", 6000).await;
        let customer = Uuid::new_v4();
        testing::user_cart(&store, customer, &[(product.id, 1)]).await;

        let checkout = CheckoutService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            testing::notifications(&store),
        );
        let receipt = checkout.checkout(customer, testing::checkout_request()).await.unwrap();
        let order = checkout.get_order(customer, receipt.order_id).await.unwrap();

        Fixture {
            service: FulfillmentService::new(store.clone(), testing::notifications(&store)),
            store,
            merchant,
            customer,
            order_id: receipt.order_id,
            sub_order_id: order.sub_orders[0].sub_order.id,
        }
    }

    async fn status(f: &Fixture) -> SubOrderStatus {
        f.store.get_sub_order(f.sub_order_id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_accept_twice() {
        let f = fixture().await;
        let first = f
            .service
            .transition(f.merchant, f.sub_order_id, FulfillmentAction::Accept, ShipmentDetails::default())
            .await
            .unwrap();
        assert_eq!(first, TransitionOutcome::Applied { from: SubOrderStatus::Pending, to: SubOrderStatus::Processing });

        let second = f
            .service
            .transition(f.merchant, f.sub_order_id, FulfillmentAction::Accept, ShipmentDetails::default())
            .await
            .unwrap();
        assert_eq!(
            second,
            TransitionOutcome::InvalidTransition { from: SubOrderStatus::Processing, attempted: FulfillmentAction::Accept }
        );
        assert_eq!(status(&f).await, SubOrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_full_lifecycle_notifies_customer() {
        let f = fixture().await;
        let shipment = ShipmentDetails {
            tracking_number: Some("TRK-42".to_string()),
            carrier: Some("UPS".to_string()),
            estimated_delivery: None,
        };
        for (action, details) in [
            (FulfillmentAction::Accept, ShipmentDetails::default()),
            (FulfillmentAction::Ship, shipment),
            (FulfillmentAction::Deliver, ShipmentDetails::default()),
        ] {
            let outcome = f.service.transition(f.merchant, f.sub_order_id, action, details).await.unwrap();
            assert!(outcome.is_applied());
        }

        let sub_order = f.store.get_sub_order(f.sub_order_id).await.unwrap().unwrap();
        assert_eq!(sub_order.status, SubOrderStatus::Delivered);
        assert_eq!(sub_order.tracking_number.as_deref(), Some("TRK-42"));
        assert!(sub_order.shipped_at.is_some() && sub_order.delivered_at.is_some());

        // Order confirmation plus one per transition.
        assert_eq!(f.store.list_notifications(f.customer, false).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_is_terminal() {
        let f = fixture().await;
        f.service
            .transition(f.merchant, f.sub_order_id, FulfillmentAction::Reject, ShipmentDetails::default())
            .await
            .unwrap();
        for action in [FulfillmentAction::Accept, FulfillmentAction::Reject, FulfillmentAction::Ship, FulfillmentAction::Deliver] {
            let outcome = f
                .service
                .transition(f.merchant, f.sub_order_id, action, ShipmentDetails::default())
                .await
                .unwrap();
            assert!(!outcome.is_applied());
        }
        assert_eq!(status(&f).await, SubOrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_ship_requires_processing() {
        let f = fixture().await;
        let outcome = f
            .service
            .transition(f.merchant, f.sub_order_id, FulfillmentAction::Ship, ShipmentDetails::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::InvalidTransition { from: SubOrderStatus::Pending, attempted: FulfillmentAction::Ship }
        );
    }

    #[tokio::test]
    async fn test_foreign_merchant_forbidden_and_missing_not_found() {
        let f = fixture().await;
        let intruder = testing::merchant(&f.store, "Someone Else").await;

        let result = f
            .service
            .transition(intruder, f.sub_order_id, FulfillmentAction::Accept, ShipmentDetails::default())
            .await;
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
        assert_eq!(status(&f).await, SubOrderStatus::Pending);

        let result = f
            .service
            .transition(f.merchant, Uuid::new_v4(), FulfillmentAction::Accept, ShipmentDetails::default())
            .await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));

        assert!(matches!(f.service.get_for_merchant(intruder, f.sub_order_id).await, Err(CoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_concurrent_accept_and_reject_linearize() {
        let f = fixture().await;
        let (accept, reject) = tokio::join!(
            f.service.transition(f.merchant, f.sub_order_id, FulfillmentAction::Accept, ShipmentDetails::default()),
            f.service.transition(f.merchant, f.sub_order_id, FulfillmentAction::Reject, ShipmentDetails::default()),
        );
        let (accept, reject) = (accept.unwrap(), reject.unwrap());

        let final_status = status(&f).await;
        if accept.is_applied() {
            // Reject may still legally apply from processing afterwards.
            assert!(matches!(final_status, SubOrderStatus::Processing | SubOrderStatus::Cancelled));
        } else {
            assert!(reject.is_applied());
            assert_eq!(final_status, SubOrderStatus::Cancelled);
        }
        assert!(accept.is_applied() || reject.is_applied());
    }

    #[tokio::test]
    async fn test_stale_plan_loses_cas() {
        let f = fixture().await;
        let sub_order = f.store.get_sub_order(f.sub_order_id).await.unwrap().unwrap();
        let accept = SubOrderTransition::plan(&sub_order, FulfillmentAction::Accept, ShipmentDetails::default(), Utc::now()).unwrap();
        let reject = SubOrderTransition::plan(&sub_order, FulfillmentAction::Reject, ShipmentDetails::default(), Utc::now()).unwrap();

        assert!(f.store.apply_transition(&reject).await.unwrap());
        assert!(!f.store.apply_transition(&accept).await.unwrap());
        assert_eq!(status(&f).await, SubOrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_merchant_listing_filters_paid() {
        let f = fixture().await;
        assert_eq!(f.service.list_for_merchant(f.merchant, false).await.unwrap().len(), 1);
        assert!(f.service.list_for_merchant(f.merchant, true).await.unwrap().is_empty());

        assert!(f.store.set_payment_status(f.order_id, PaymentStatus::Paid).await);
        let paid = f.service.list_for_merchant(f.merchant, true).await.unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].customer_id, f.customer);
    }
}
