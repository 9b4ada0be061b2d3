use chrono::Duration;

/// Render an elapsed time in its coarsest whole unit
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if age.num_hours() < 1 {
        return plural(minutes, "minute");
    }
    if age.num_days() < 1 {
        return plural(age.num_hours(), "hour");
    }
    plural(age.num_days(), "day")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_age_units() {
        assert_eq!(format_age(Duration::seconds(0)), "just now");
        assert_eq!(format_age(Duration::seconds(59)), "just now");
        assert_eq!(format_age(Duration::seconds(60)), "1 minute ago");
        assert_eq!(format_age(Duration::minutes(59)), "59 minutes ago");
        assert_eq!(format_age(Duration::minutes(61)), "1 hour ago");
        assert_eq!(format_age(Duration::hours(23) + Duration::minutes(59)), "23 hours ago");
        assert_eq!(format_age(Duration::hours(24)), "1 day ago");
        assert_eq!(format_age(Duration::days(9) + Duration::hours(20)), "9 days ago");
    }
}
