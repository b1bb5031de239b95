use chrono::{DateTime, Datelike, Utc};

const MONTHS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

/// Spanish relative label for how long ago `then` was, as shown in the
/// admin conversation list. Future times read as `Ahora`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - then).num_milliseconds();
    if elapsed < 60_000 {
        return "Ahora".to_string();
    }
    if elapsed < 3_600_000 {
        return format!("Hace {}m", elapsed / 60_000);
    }
    if elapsed < 86_400_000 {
        return format!("Hace {}h", elapsed / 3_600_000);
    }
    match elapsed / 86_400_000 {
        1 => "Ayer".to_string(),
        days if days < 7 => format!("Hace {days} días"),
        _ => format!("{} {}", then.day(), MONTHS[then.month0() as usize]),
    }
}

/// `HH:MM`, 24-hour.
pub fn time_of_day(at: DateTime<Utc>) -> String {
    at.format("%H:%M").to_string()
}
