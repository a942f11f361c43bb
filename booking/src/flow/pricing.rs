//! Booking price computation.
//!
//! Pure function of the venue's daily rate and the add-on selection. Values
//! keep full `f64` precision; rounding happens only in `format_amount`, so the
//! summary shown to the user and the submitted `totalPrice` never diverge.

use crate::model::Addons;

pub const DECORATION_RATE: f64 = 0.15;
pub const CATERING_RATE: f64 = 0.25;
pub const EQUIPMENT_RATE: f64 = 0.10;
/// Flat tax multiplier (18% GST).
pub const TAX_MULTIPLIER: f64 = 1.18;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceBreakdown {
    pub base: f64,
    pub decoration: f64,
    pub catering: f64,
    pub equipment: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl PriceBreakdown {
    pub fn compute(daily_rate: f64, addons: &Addons) -> Self {
        let part = |on: bool, rate: f64| if on { daily_rate * rate } else { 0.0 };

        let decoration = part(addons.decoration, DECORATION_RATE);
        let catering = part(addons.catering, CATERING_RATE);
        let equipment = part(addons.equipment, EQUIPMENT_RATE);

        // Same summation order as the total everywhere else.
        let mut subtotal = daily_rate;
        subtotal += decoration;
        subtotal += catering;
        subtotal += equipment;

        let total = subtotal * TAX_MULTIPLIER;

        Self {
            base: daily_rate,
            decoration,
            catering,
            equipment,
            subtotal,
            tax: total - subtotal,
            total,
        }
    }
}

/// Total price including add-ons and tax.
pub fn compute_total(daily_rate: f64, addons: &Addons) -> f64 {
    PriceBreakdown::compute(daily_rate, addons).total
}

/// Display form, rounded to two decimals with thousands separators: `₹16,520.00`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i128;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();

    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}₹{grouped}.{frac:02}")
}
