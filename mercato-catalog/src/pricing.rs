use rust_decimal::Decimal;

/// Number of decimal places every stored amount carries.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a `NUMERIC(10,2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// The price a customer pays right now.
///
/// The sale price wins only when the product is flagged as on sale *and* a
/// sale price has been set; otherwise the listed original price applies.
pub fn effective_price(original_price: Decimal, sale_price: Option<Decimal>, is_on_sale: bool) -> Decimal {
    match sale_price {
        Some(sale) if is_on_sale => round_money(sale),
        _ => round_money(original_price),
    }
}

/// `unit_price × quantity`, rounded to cents.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, PricingError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .filter(|total| *total <= MAX_AMOUNT)
        .ok_or(PricingError::AmountOutOfRange)
}

/// Sum a sequence of amounts, rounded to cents.
pub fn sum_amounts<I>(amounts: I) -> Result<Decimal, PricingError>
where
    I: IntoIterator<Item = Decimal>,
{
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .map(round_money)
        .ok_or(PricingError::AmountOutOfRange)?;
    if total > MAX_AMOUNT {
        return Err(PricingError::AmountOutOfRange);
    }
    Ok(total)
}

pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(MONEY_SCALE);
    rounded.rescale(MONEY_SCALE);
    rounded
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Amount exceeds the maximum of {}", MAX_AMOUNT)]
    AmountOutOfRange,
}
