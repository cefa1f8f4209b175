//! Sub-order fulfillment state machine.
//!
//! ```text
//! pending ──accept──▶ processing ──ship──▶ shipped ──deliver──▶ delivered
//!    │                    │
//!    └──────reject────────┴──────▶ cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{SubOrder, SubOrderStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentAction {
    Accept,
    Reject,
    Ship,
    Deliver,
}

impl FulfillmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentAction::Accept => "accept",
            FulfillmentAction::Reject => "reject",
            FulfillmentAction::Ship => "ship",
            FulfillmentAction::Deliver => "deliver",
        }
    }

    /// Status this action leads to from `from`, if the action is allowed there.
    pub fn target(&self, from: SubOrderStatus) -> Option<SubOrderStatus> {
        use SubOrderStatus::*;
        match (self, from) {
            (FulfillmentAction::Accept, Pending) => Some(Processing),
            (FulfillmentAction::Reject, Pending | Processing) => Some(Cancelled),
            (FulfillmentAction::Ship, Processing) => Some(Shipped),
            (FulfillmentAction::Deliver, Shipped) => Some(Delivered),
            _ => None,
        }
    }
}

impl FromStr for FulfillmentAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(FulfillmentAction::Accept),
            "reject" => Ok(FulfillmentAction::Reject),
            "ship" => Ok(FulfillmentAction::Ship),
            "deliver" => Ok(FulfillmentAction::Deliver),
            other => Err(format!("Unknown fulfillment action: {}", other)),
        }
    }
}

impl fmt::Display for FulfillmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of attempting a transition. An invalid transition leaves the
/// stored status untouched.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransitionOutcome {
    #[serde(rename = "success")]
    Applied { from: SubOrderStatus, to: SubOrderStatus },
    InvalidTransition { from: SubOrderStatus, attempted: FulfillmentAction },
}

impl TransitionOutcome {
    pub fn evaluate(from: SubOrderStatus, action: FulfillmentAction) -> Self {
        match action.target(from) {
            Some(to) => TransitionOutcome::Applied { from, to },
            None => TransitionOutcome::InvalidTransition { from, attempted: action },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Optional tracking data supplied when shipping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipmentDetails {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// A conditional status write: applies only while the sub-order is still in `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubOrderTransition {
    pub sub_order_id: Uuid,
    pub action: FulfillmentAction,
    pub from: SubOrderStatus,
    pub to: SubOrderStatus,
    pub shipment: ShipmentDetails,
    pub at: DateTime<Utc>,
}

impl SubOrderTransition {
    /// Plan `action` against the sub-order's current status.
    pub fn plan(
        sub_order: &SubOrder,
        action: FulfillmentAction,
        shipment: ShipmentDetails,
        at: DateTime<Utc>,
    ) -> Result<Self, TransitionOutcome> {
        match TransitionOutcome::evaluate(sub_order.status, action) {
            TransitionOutcome::Applied { from, to } => Ok(Self {
                sub_order_id: sub_order.id,
                action,
                from,
                to,
                shipment: if to == SubOrderStatus::Shipped { shipment } else { ShipmentDetails::default() },
                at,
            }),
            invalid => Err(invalid),
        }
    }

    pub fn outcome(&self) -> TransitionOutcome {
        TransitionOutcome::Applied { from: self.from, to: self.to }
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        (self.to == SubOrderStatus::Shipped).then_some(self.at)
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        (self.to == SubOrderStatus::Delivered).then_some(self.at)
    }

    /// Apply to an in-memory row. Returns false (and changes nothing) when
    /// the row is no longer in the expected status.
    pub fn apply_to(&self, sub_order: &mut SubOrder) -> bool {
        if sub_order.id != self.sub_order_id || sub_order.status != self.from {
            return false;
        }
        sub_order.status = self.to;
        sub_order.updated_at = self.at;
        if let Some(at) = self.shipped_at() {
            sub_order.shipped_at = Some(at);
            if self.shipment.tracking_number.is_some() {
                sub_order.tracking_number = self.shipment.tracking_number.clone();
            }
            if self.shipment.carrier.is_some() {
                sub_order.carrier = self.shipment.carrier.clone();
            }
            if self.shipment.estimated_delivery.is_some() {
                sub_order.estimated_delivery = self.shipment.estimated_delivery;
            }
        }
        if let Some(at) = self.delivered_at() {
            sub_order.delivered_at = Some(at);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use super::FulfillmentAction::*;
    use crate::models::SubOrderStatus::*;

    fn sub_order(status: SubOrderStatus) -> SubOrder {
        let now = Utc::now();
        SubOrder {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            sub_order_number: "SUB-0123456789".to_string(),
            status,
            subtotal: Decimal::new(2000, 2),
            tracking_number: None,
            carrier: None,
            estimated_delivery: None,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transition_table() {
        let allowed = [
            (Accept, Pending, Processing),
            (Reject, Pending, Cancelled),
            (Reject, Processing, Cancelled),
            (Ship, Processing, Shipped),
            (Deliver, Shipped, Delivered),
        ];
        for action in [Accept, Reject, Ship, Deliver] {
            for from in SubOrderStatus::ALL {
                let expected = allowed
                    .iter()
                    .find(|(a, f, _)| *a == action && *f == from)
                    .map(|(_, _, to)| *to);
                assert_eq!(action.target(from), expected, "{} from {}", action, from);
            }
        }
    }

    #[test]
    fn test_terminal_states_allow_nothing() {
        for action in [Accept, Reject, Ship, Deliver] {
            assert_eq!(action.target(Cancelled), None);
            assert_eq!(action.target(Delivered), None);
        }
    }

    #[test]
    fn test_accept_twice_reports_invalid_transition() {
        let mut row = sub_order(Pending);
        let first = SubOrderTransition::plan(&row, Accept, ShipmentDetails::default(), Utc::now()).unwrap();
        assert!(first.apply_to(&mut row));
        assert_eq!(row.status, Processing);

        let second = SubOrderTransition::plan(&row, Accept, ShipmentDetails::default(), Utc::now());
        assert_eq!(second, Err(TransitionOutcome::InvalidTransition { from: Processing, attempted: Accept }));
        assert_eq!(row.status, Processing);
    }

    #[test]
    fn test_ship_records_tracking() {
        let mut row = sub_order(Processing);
        let shipment = ShipmentDetails {
            tracking_number: Some("1Z999".to_string()),
            carrier: Some("DHL".to_string()),
            estimated_delivery: None,
        };
        let transition = SubOrderTransition::plan(&row, Ship, shipment, Utc::now()).unwrap();
        assert!(transition.apply_to(&mut row));
        assert_eq!(row.status, Shipped);
        assert_eq!(row.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(row.carrier.as_deref(), Some("DHL"));
        assert!(row.shipped_at.is_some());
        assert!(row.delivered_at.is_none());

        let deliver = SubOrderTransition::plan(&row, Deliver, ShipmentDetails::default(), Utc::now()).unwrap();
        assert!(deliver.apply_to(&mut row));
        assert_eq!(row.status, Delivered);
        assert!(row.delivered_at.is_some());
    }

    #[test]
    fn test_stale_transition_does_not_apply() {
        let mut row = sub_order(Pending);
        let accept = SubOrderTransition::plan(&row, Accept, ShipmentDetails::default(), Utc::now()).unwrap();
        let reject = SubOrderTransition::plan(&row, Reject, ShipmentDetails::default(), Utc::now()).unwrap();

        assert!(reject.apply_to(&mut row));
        assert!(!accept.apply_to(&mut row));
        assert_eq!(row.status, Cancelled);
    }

    #[test]
    fn test_outcome_serialization() {
        let applied = serde_json::to_value(TransitionOutcome::Applied { from: Pending, to: Processing }).unwrap();
        assert_eq!(applied, serde_json::json!({"status": "success", "from": "pending", "to": "processing"}));

        let invalid = serde_json::to_value(TransitionOutcome::InvalidTransition { from: Cancelled, attempted: Ship }).unwrap();
        assert_eq!(
            invalid,
            serde_json::json!({"status": "invalid_transition", "from": "cancelled", "attempted": "ship"})
        );
    }
}
