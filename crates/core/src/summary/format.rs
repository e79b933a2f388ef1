/// Rupee amount with Indian digit grouping (`₹1,23,456.5`). Rounded to two
/// decimals; trailing fractional zeros are dropped.
pub fn format_rupees(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("₹{amount}");
    }

    let paise = (amount.abs() * 100.0).round() as u64;
    let rupees = paise / 100;
    let fraction = paise % 100;
    let sign = if amount < 0.0 && paise > 0 { "-" } else { "" };

    let mut out = format!("{sign}₹{}", group_indian(rupees));
    if fraction > 0 {
        let digits = format!("{fraction:02}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

// Last three digits, then groups of two.
fn group_indian(n: u64) -> String {
    let digits = n.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}
