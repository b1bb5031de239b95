/// Format a price in whole Colombian pesos the way the storefront shows it:
/// `$` followed by thousands grouped with `.` (es-CO).
pub fn format_amount(amount: u64) -> String {
    format!("${}", group_thousands(amount))
}

/// Group digits in threes with `.` separators.
pub fn group_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_amounts_have_no_separator() {
        assert_eq!(format_amount(0), "$0");
        assert_eq!(format_amount(950), "$950");
    }

    #[test]
    fn thousands_use_dots() {
        assert_eq!(format_amount(12_500), "$12.500");
        assert_eq!(format_amount(1_250_000), "$1.250.000");
        assert_eq!(group_thousands(100_000), "100.000");
    }
}
