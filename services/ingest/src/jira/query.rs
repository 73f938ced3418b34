use chrono::{Days, NaiveDate};
use quarry_common::types::CollectionId;
use quarry_store::checkpoint::Checkpoint;

/// Time bound of an extraction query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueFilter {
    All,
    UpdatedSince(NaiveDate),
}

/// Decide the filter for one run of one collection.
///
/// Incremental runs restart from the *day* of the watermark, so records
/// updated later that same day are fetched again. Without a watermark the
/// lookback window applies. The result is computed once per run; the
/// watermark advancing mid-run does not change it.
pub fn incremental_filter(
    incremental: bool,
    lookback_days: u32,
    checkpoint: &Checkpoint,
    today: NaiveDate,
) -> IssueFilter {
    if !incremental {
        return IssueFilter::All;
    }

    if let Some(watermark) = checkpoint.watermark.as_deref() {
        match watermark_date(watermark) {
            Some(day) => return IssueFilter::UpdatedSince(day),
            None => tracing::warn!(
                watermark,
                "watermark has no leading YYYY-MM-DD, falling back to lookback window"
            ),
        }
    }

    let since = today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    IssueFilter::UpdatedSince(since)
}

fn watermark_date(watermark: &str) -> Option<NaiveDate> {
    let day = watermark.split('T').next()?.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Build the JQL for one collection.
///
/// Generates: `project = HADOOP AND updated >= "2025-01-01" ORDER BY created ASC, key ASC`
///
/// Creation order keeps offsets stable across resumed runs: new issues land
/// at the end of the result set instead of shifting earlier pages.
pub fn build_search_jql(collection: &CollectionId, filter: &IssueFilter) -> String {
    let mut jql = format!("project = {}", escape_jql_value(collection.as_str()));
    if let IssueFilter::UpdatedSince(day) = filter {
        jql.push_str(&format!(" AND updated >= \"{}\"", day.format("%Y-%m-%d")));
    }
    jql.push_str(" ORDER BY created ASC, key ASC");
    jql
}

/// Escape a JQL value, quoting it when it contains special characters.
fn escape_jql_value(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
