use recon_common::Paise;

use crate::ShippingApiError;

/// The provider expresses amounts as rupees with an optional two-digit paise fraction, e.g. `"1250.50"`.
pub fn parse_rupees(amount: &str) -> Result<Paise, ShippingApiError> {
    let invalid = |e: String| ShippingApiError::InvalidCurrencyAmount(format!("Invalid amount: {amount}. {e}"));
    let mut parts = amount.trim().splitn(2, '.');
    let rupees = parts.next().unwrap_or_default().parse::<i64>().map_err(|e| invalid(e.to_string()))?;
    let paise = match parts.next() {
        None => 0,
        Some(p) if p.len() == 1 => p.parse::<i64>().map_err(|e| invalid(e.to_string()))? * 10,
        Some(p) if p.len() == 2 => p.parse::<i64>().map_err(|e| invalid(e.to_string()))?,
        Some(_) => return Err(invalid("Too many decimal places".into())),
    };
    if rupees < 0 {
        return Err(invalid("Negative amount".into()));
    }
    Ok(Paise::from(rupees * 100 + paise))
}

pub fn format_rupees(amount: Paise) -> String {
    let v = amount.value();
    let sign = if v < 0 { "-" } else { "" };
    format!("{sign}{}.{:02}", v.abs() / 100, v.abs() % 100)
}
