use chrono::TimeDelta;

const TELEGRAM_TOKEN: &str = "IPWATCH_TELEGRAM_TOKEN";

pub fn get_telegram_token() -> Option<String> {
    let token_from_env = std::env::var(TELEGRAM_TOKEN);
    token_from_env.ok().filter(|token| !token.trim().is_empty())
}

/// Format an outage duration as `H:MM:SS`, prefixed with `N day(s), ` once it
/// spans more than a day. Sub-second precision is dropped.
pub fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
