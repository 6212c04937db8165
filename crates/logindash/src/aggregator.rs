//! Turns a flat list of login events into the login summary report.
//!
//! Everything here is pure: the same events and `now` always give the same
//! summary. Rows without a username or with a timestamp that does not parse
//! are skipped and only show up in [`AggregationStats`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use logindash_models::{ActiveDaysItem, LastLoginItem, LoginEvent, LoginSummary, Timestamp};

/// Row accounting for one aggregation pass. Never part of the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub total: usize,
    pub dropped: usize,
    pub excluded: usize,
}

impl AggregationStats {
    pub fn used(&self) -> usize {
        self.total - self.dropped - self.excluded
    }
}

struct UserActivity {
    display_name: String,
    days: BTreeSet<NaiveDate>,
    last_login: DateTime<Utc>,
    active_today: bool,
}

pub fn summarize<I>(events: I, now: DateTime<Utc>, excluded_users: &BTreeSet<String>) -> LoginSummary
where
    I: IntoIterator<Item = LoginEvent>,
{
    summarize_with_stats(events, now, excluded_users).0
}

/// Same as [`summarize`], also reporting how many rows were skipped.
///
/// Both output lists break ties on username, ascending.
pub fn summarize_with_stats<I>(
    events: I,
    now: DateTime<Utc>,
    excluded_users: &BTreeSet<String>,
) -> (LoginSummary, AggregationStats)
where
    I: IntoIterator<Item = LoginEvent>,
{
    let today = now.date_naive();
    let mut stats = AggregationStats::default();
    let mut users: BTreeMap<String, UserActivity> = BTreeMap::new();

    for event in events {
        stats.total += 1;

        let username = match event.username {
            Some(u) if !u.is_empty() => u,
            _ => {
                stats.dropped += 1;
                continue;
            }
        };
        if excluded_users.contains(&username) {
            stats.excluded += 1;
            continue;
        }
        let Some(timestamp) = event.timestamp.as_ref().and_then(parse_timestamp) else {
            stats.dropped += 1;
            continue;
        };

        let day = timestamp.date_naive();
        let activity = users
            .entry(username)
            .or_insert_with_key(|name| UserActivity {
                display_name: format_username(name),
                days: BTreeSet::new(),
                last_login: timestamp,
                active_today: false,
            });
        activity.days.insert(day);
        if timestamp > activity.last_login {
            activity.last_login = timestamp;
        }
        if day == today {
            activity.active_today = true;
        }
    }

    let mut active_days: Vec<ActiveDaysItem> = users
        .iter()
        .map(|(username, activity)| ActiveDaysItem {
            username: username.clone(),
            display_name: activity.display_name.clone(),
            active_days: activity.days.len() as i64,
        })
        .collect();
    active_days.sort_by(|a, b| {
        b.active_days
            .cmp(&a.active_days)
            .then_with(|| a.username.cmp(&b.username))
    });

    let mut last_logins: Vec<LastLoginItem> = users
        .iter()
        .map(|(username, activity)| LastLoginItem {
            username: username.clone(),
            display_name: activity.display_name.clone(),
            last_login_date: activity.last_login.date_naive(),
        })
        .collect();
    last_logins.sort_by(|a, b| {
        b.last_login_date
            .cmp(&a.last_login_date)
            .then_with(|| a.username.cmp(&b.username))
    });

    let mut today_users: Vec<String> = users
        .values()
        .filter(|activity| activity.active_today)
        .map(|activity| activity.display_name.clone())
        .collect();
    today_users.sort();

    let summary = LoginSummary {
        distinct_user_count: users.len() as i64,
        today_users,
        active_days,
        last_logins,
    };
    (summary, stats)
}

/// Human-readable label for a username or email address.
///
/// `"jane.doe@x.com"` becomes `"Jane Doe"`. Falls back to the raw username
/// when the local part has no segments.
pub fn format_username(username: &str) -> String {
    let local_part = username.split('@').next().unwrap_or_default();
    let pieces: Vec<String> = local_part
        .split(['.', '_', '-'])
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect();
    if pieces.is_empty() {
        return username.to_string();
    }
    pieces.join(" ")
}

/// First character titlecased, the rest lowercased.
///
/// Characters whose uppercase form is several characters (`ß`, `ﬁ`) keep only
/// the first one in uppercase, so `ß` gives `Ss`.
fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(segment.len());
    match titlecase_digraph(first) {
        Some(title) => out.push(title),
        None => {
            let mut upper = first.to_uppercase();
            out.extend(upper.next());
            out.extend(upper.flat_map(char::to_lowercase));
        }
    }
    out.extend(chars.flat_map(char::to_lowercase));
    out
}

// Latin digraphs have a titlecase form distinct from their uppercase one.
fn titlecase_digraph(c: char) -> Option<char> {
    match c {
        '\u{01C4}'..='\u{01C6}' => Some('\u{01C5}'),
        '\u{01C7}'..='\u{01C9}' => Some('\u{01C8}'),
        '\u{01CA}'..='\u{01CC}' => Some('\u{01CB}'),
        '\u{01F1}'..='\u{01F3}' => Some('\u{01F2}'),
        _ => None,
    }
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y%m%dT%H%M%S%.f%:z",
    "%Y%m%dT%H%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Normalises a login timestamp to UTC. Returns `None` for anything that does
/// not parse; callers drop the row.
///
/// Accepts the extended and basic ISO-8601 forms, offsets written `Z`, `±hh`,
/// `±hhmm` or `±hh:mm`, and times down to the hour. Naive date-times and bare
/// dates are taken to be UTC.
pub fn parse_timestamp(value: &Timestamp) -> Option<DateTime<Utc>> {
    match value {
        Timestamp::Instant(instant) => Some(*instant),
        Timestamp::Text(text) => parse_text(text),
    }
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    let text = normalize(text)?;

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(parsed.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Rewrites the time part so the fixed format lists can read it: a trailing
/// `Z` becomes `+00:00`, offsets gain their colon and minutes, and an
/// hour-only time gains zero minutes.
fn normalize(text: &str) -> Option<String> {
    let Some(sep) = text.find(['T', ' ']) else {
        return Some(text.to_string());
    };
    let (date, rest) = text.split_at(sep);

    let (time, offset) = match rest.strip_suffix('Z') {
        Some(time) => (time, Some("+00:00".to_string())),
        None => match rest.rfind(['+', '-']) {
            Some(i) => (&rest[..i], Some(expand_offset(&rest[i..])?)),
            None => (rest, None),
        },
    };

    let mut out = String::with_capacity(text.len() + 6);
    out.push_str(date);
    out.push_str(time);
    let clock = &time[1..];
    if clock.len() == 2 && clock.bytes().all(|b| b.is_ascii_digit()) {
        out.push_str(if date.contains('-') { ":00" } else { "00" });
    }
    if let Some(offset) = offset {
        out.push_str(&offset);
    }
    Some(out)
}

fn expand_offset(offset: &str) -> Option<String> {
    if !offset.is_ascii() {
        return None;
    }
    let (sign, digits) = offset.split_at(1);
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match digits.len() {
        2 if all_digits(digits) => Some(format!("{sign}{digits}:00")),
        4 if all_digits(digits) => Some(format!("{sign}{}:{}", &digits[..2], &digits[2..])),
        5 if digits.as_bytes()[2] == b':' && all_digits(&digits[..2]) && all_digits(&digits[3..]) => {
            Some(offset.to_string())
        }
        _ => None,
    }
}
