pub mod models;
pub mod cart;
pub mod numbering;
pub mod checkout;
pub mod fulfillment;

pub use models::{
    Address, MerchantSubOrder, Order, OrderDetail, OrderItem, OrderStatus, PaymentInfo, PaymentStatus,
    ShippingAddressInput, StatusParseError, SubOrder, SubOrderDetail, SubOrderStatus,
};
pub use cart::{Cart, CartError, CartLine, CartOwner, CartView, PricedCartLine};
pub use numbering::{OrderNumbering, RandomNumbering};
pub use checkout::{CheckoutError, CheckoutLine, CheckoutPlan, CheckoutRequest, ConsumedLine, PlannedSubOrder};
pub use fulfillment::{FulfillmentAction, ShipmentDetails, SubOrderTransition, TransitionOutcome};
