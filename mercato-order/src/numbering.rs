use uuid::Uuid;

pub const ORDER_PREFIX: &str = "ORD-";
pub const SUB_ORDER_PREFIX: &str = "SUB-";
const SUFFIX_LEN: usize = 10;

/// Source of human-readable order and sub-order numbers.
///
/// Numbers are unique in storage; a collision fails the checkout that hit it.
pub trait OrderNumbering: Send + Sync {
    fn order_number(&self) -> String;
    fn sub_order_number(&self) -> String;
}

/// `ORD-`/`SUB-` followed by 10 random uppercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNumbering;

impl OrderNumbering for RandomNumbering {
    fn order_number(&self) -> String {
        format!("{}{}", ORDER_PREFIX, random_suffix())
    }

    fn sub_order_number(&self) -> String {
        format!("{}{}", SUB_ORDER_PREFIX, random_suffix())
    }
}

fn random_suffix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..SUFFIX_LEN].to_uppercase()
}
