use rust_decimal::Decimal;

/// Amount with two decimals and comma-grouped thousands: 1,234.56
pub fn money(val: Decimal) -> String {
    let fixed = format!("{:.2}", val.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let groups: Vec<&str> = whole
        .as_bytes()
        .rchunks(3)
        .rev()
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    let sign = if val < Decimal::ZERO { "-" } else { "" };
    format!("{sign}{}.{cents}", groups.join(","))
}
