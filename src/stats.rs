use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;
use crate::models::{CommitRecord, RecentCommit, Strategy};

pub const MAX_RECENT_COMMITS: usize = 20;
pub const TOP_REPOS: usize = 10;
const RECENT_MESSAGE_CHARS: usize = 60;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// How strictly commit timestamps are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Any RFC 3339 offset, or a naive date-time read as UTC.
    Flexible,
    /// Exactly `YYYY-MM-DDTHH:MM:SSZ`.
    Strict,
}

pub fn parse_timestamp(raw: &str, format: TimestampFormat) -> Option<NaiveDateTime> {
    match format {
        TimestampFormat::Strict => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ").ok(),
        TimestampFormat::Flexible => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f").ok()
            }),
    }
}

/// Running totals for one stats request.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    pub total_commits: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
    commits_by_hour: [u64; 24],
    commits_by_day: [u64; 7],
    // Insertion order doubles as the tie-break for the top-N cut.
    commits_by_repo: Vec<(String, u64)>,
    recent_commits: Vec<RecentCommit>,
    pub repos_analyzed: usize,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one commit. Line counts and the recent list only see commits whose
    /// additions are known.
    pub fn record(&mut self, commit: &CommitRecord, format: TimestampFormat) {
        self.total_commits += 1;
        match self.commits_by_repo.iter_mut().find(|(name, _)| *name == commit.repo) {
            Some((_, count)) => *count += 1,
            None => self.commits_by_repo.push((commit.repo.clone(), 1)),
        }

        match commit.date.as_deref().map(|raw| (raw, parse_timestamp(raw, format))) {
            Some((_, Some(dt))) => {
                self.commits_by_hour[dt.hour() as usize] += 1;
                self.commits_by_day[dt.weekday().num_days_from_monday() as usize] += 1;
            }
            Some((raw, None)) => {
                warn!("Unparseable timestamp '{}' on commit {} in {}", raw, commit.sha, commit.repo);
            }
            None => warn!("Commit {} in {} has no timestamp", commit.sha, commit.repo),
        }

        if let Some(additions) = commit.additions {
            let deletions = commit.deletions.unwrap_or(0);
            self.total_additions += additions;
            self.total_deletions += deletions;

            if self.recent_commits.len() < MAX_RECENT_COMMITS {
                self.recent_commits.push(RecentCommit {
                    sha: short_sha(&commit.sha),
                    message: first_line(&commit.message, RECENT_MESSAGE_CHARS),
                    date: commit.date.clone(),
                    repo: commit.repo.clone(),
                    additions,
                    deletions,
                });
            }
        }
    }

    pub fn repo_commit_sum(&self) -> u64 {
        self.commits_by_repo.iter().map(|(_, count)| count).sum()
    }

    /// Reduce into the response shape.
    pub fn finish(self, strategy: Strategy, since: Option<String>) -> StatsSummary {
        let mut by_repo = self.commits_by_repo;
        // sort_by is stable, so equal counts keep first-seen order
        by_repo.sort_by(|a, b| b.1.cmp(&a.1));
        by_repo.truncate(TOP_REPOS);

        let by_hour = self
            .commits_by_hour
            .iter()
            .enumerate()
            .map(|(hour, count)| (hour.to_string(), *count))
            .collect();
        let by_day = WEEKDAYS
            .iter()
            .zip(self.commits_by_day.iter())
            .map(|(day, count)| (weekday_name(*day).to_string(), *count))
            .collect();

        StatsSummary {
            total_commits: self.total_commits,
            total_additions: self.total_additions,
            total_deletions: self.total_deletions,
            commits_by_hour: OrderedCounts(by_hour),
            commits_by_day: OrderedCounts(by_day),
            commits_by_repo: OrderedCounts(by_repo),
            recent_commits: self.recent_commits,
            repos_analyzed: self.repos_analyzed,
            strategy,
            time_range: if since.is_some() { "filtered" } else { "all_time" }.to_string(),
            filtered_since: since,
        }
    }
}

/// A string-keyed counter that serializes as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedCounts(pub Vec<(String, u64)>);

impl OrderedCounts {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> u64 {
        self.0.iter().map(|(_, v)| v).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for OrderedCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, count) in &self.0 {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatsSummary {
    pub total_commits: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub commits_by_hour: OrderedCounts,
    pub commits_by_day: OrderedCounts,
    pub commits_by_repo: OrderedCounts,
    pub recent_commits: Vec<RecentCommit>,
    pub repos_analyzed: usize,
    pub strategy: Strategy,
    pub time_range: String,
    pub filtered_since: Option<String>,
}

pub fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

pub fn first_line(message: &str, max_chars: usize) -> String {
    message.lines().next().unwrap_or("").chars().take(max_chars).collect()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(repo: &str, date: &str, lines: Option<(u64, u64)>) -> CommitRecord {
        CommitRecord {
            sha: "0123456789abcdef".to_string(),
            author_login: Some("octocat".to_string()),
            date: Some(date.to_string()),
            message: "Fix the thing\n\nLonger body".to_string(),
            repo: repo.to_string(),
            additions: lines.map(|l| l.0),
            deletions: lines.map(|l| l.1),
        }
    }

    #[test]
    fn buckets_by_hour_and_weekday() {
        let mut acc = StatsAccumulator::new();
        // 2024-01-15 is a Monday
        acc.record(&commit("alpha", "2024-01-15T09:30:00Z", Some((3, 1))), TimestampFormat::Strict);
        acc.record(&commit("alpha", "2024-01-16T09:05:00Z", Some((2, 2))), TimestampFormat::Strict);

        let summary = acc.finish(Strategy::Paginated, None);
        assert_eq!(summary.total_commits, 2);
        assert_eq!(summary.total_additions, 5);
        assert_eq!(summary.total_deletions, 3);
        assert_eq!(summary.commits_by_hour.get("9"), Some(2));
        assert_eq!(summary.commits_by_hour.len(), 24);
        assert_eq!(summary.commits_by_day.get("Monday"), Some(1));
        assert_eq!(summary.commits_by_day.get("Tuesday"), Some(1));
        assert_eq!(summary.commits_by_day.get("Sunday"), Some(0));
        assert_eq!(summary.time_range, "all_time");
    }

    #[test]
    fn flexible_timestamps_normalise_to_utc() {
        let dt = parse_timestamp("2024-01-15T23:30:00-02:00", TimestampFormat::Flexible).unwrap();
        assert_eq!(dt.hour(), 1);
        assert_eq!(dt.weekday(), Weekday::Tue);

        assert!(parse_timestamp("2024-01-15T10:00:00", TimestampFormat::Flexible).is_some());
        assert!(parse_timestamp("2024-01-15T10:00:00.123Z", TimestampFormat::Flexible).is_some());
        assert!(parse_timestamp("2024-01-15T10:00:00+00:00", TimestampFormat::Strict).is_none());
    }

    #[test]
    fn malformed_timestamp_still_counts_toward_totals() {
        let mut acc = StatsAccumulator::new();
        acc.record(&commit("alpha", "yesterday", Some((1, 0))), TimestampFormat::Strict);

        assert_eq!(acc.repo_commit_sum(), 1);
        let summary = acc.finish(Strategy::Paginated, None);
        assert_eq!(summary.total_commits, 1);
        assert_eq!(summary.commits_by_hour.sum(), 0);
        assert_eq!(summary.commits_by_day.sum(), 0);
        assert_eq!(summary.commits_by_repo.get("alpha"), Some(1));
    }

    #[test]
    fn commits_without_line_data_skip_recent_and_line_totals() {
        let mut acc = StatsAccumulator::new();
        acc.record(&commit("alpha", "2024-01-15T09:30:00Z", None), TimestampFormat::Strict);

        let summary = acc.finish(Strategy::Paginated, None);
        assert_eq!(summary.total_commits, 1);
        assert_eq!(summary.total_additions, 0);
        assert!(summary.recent_commits.is_empty());
    }

    #[test]
    fn recent_commits_are_capped_and_trimmed() {
        let mut acc = StatsAccumulator::new();
        for i in 0..25 {
            let mut c = commit("alpha", "2024-01-15T09:30:00Z", Some((1, 1)));
            c.message = format!("{} {}", i, "x".repeat(100));
            acc.record(&c, TimestampFormat::Strict);
        }

        let summary = acc.finish(Strategy::Batch, None);
        assert_eq!(summary.recent_commits.len(), MAX_RECENT_COMMITS);
        assert_eq!(summary.total_additions, 25);
        let first = &summary.recent_commits[0];
        assert_eq!(first.sha, "0123456");
        assert_eq!(first.message.chars().count(), 60);
        assert!(first.message.starts_with("0 x"));
        assert!(summary.recent_commits[19].message.starts_with("19 "));
    }

    #[test]
    fn top_repos_keep_first_seen_order_on_ties() {
        let mut acc = StatsAccumulator::new();
        let counts = [
            ("r0", 1), ("r1", 5), ("r2", 2), ("r3", 2), ("r4", 1), ("r5", 1),
            ("r6", 1), ("r7", 3), ("r8", 1), ("r9", 1), ("r10", 1), ("r11", 4),
        ];
        for (repo, n) in counts {
            for _ in 0..n {
                acc.record(&commit(repo, "2024-01-15T09:30:00Z", Some((0, 0))), TimestampFormat::Strict);
            }
        }
        assert_eq!(acc.total_commits, acc.repo_commit_sum());

        let summary = acc.finish(Strategy::Batch, None);
        let order: Vec<&str> = summary.commits_by_repo.keys().collect();
        assert_eq!(order, vec!["r1", "r11", "r7", "r2", "r3", "r0", "r4", "r5", "r6", "r8"]);
        assert!(summary.total_commits >= summary.commits_by_repo.sum());
    }

    #[test]
    fn serializes_counters_as_ordered_objects() {
        let mut acc = StatsAccumulator::new();
        acc.record(&commit("beta", "2024-01-15T09:30:00Z", Some((1, 0))), TimestampFormat::Strict);
        acc.record(&commit("alpha", "2024-01-15T09:30:00Z", Some((1, 0))), TimestampFormat::Strict);
        acc.record(&commit("alpha", "2024-01-15T09:30:00Z", Some((1, 0))), TimestampFormat::Strict);

        let json = serde_json::to_string(&acc.finish(Strategy::Batch, Some("2024-01-01T00:00:00Z".into())))
            .unwrap();
        assert!(json.contains(r#""commits_by_repo":{"alpha":2,"beta":1}"#));
        assert!(json.contains(r#""commits_by_day":{"Monday":3,"Tuesday":0"#));
        assert!(json.contains(r#""strategy":"batch""#));
        assert!(json.contains(r#""time_range":"filtered""#));
    }
}
