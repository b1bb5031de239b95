//! Input checks shared by the node and the storefront.

use std::sync::LazyLock;

use regex::Regex;

/// `local@domain.tld`: no whitespace, one `@`, and a dotted domain with no
/// empty labels.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}
