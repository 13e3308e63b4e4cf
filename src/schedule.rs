use crate::models::Task;
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

/// Upcoming view shows two weeks ahead.
pub const UPCOMING_DAYS: u32 = 14;

// NoDate sorts before any date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DayKey {
    NoDate,
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub day: DayKey,
    pub tasks: Vec<Task>,
}

impl DayBucket {
    pub fn label(&self, today: NaiveDate) -> String {
        match self.day {
            DayKey::NoDate => "No date".to_string(),
            DayKey::Date(d) if d == today => format!("Today · {}", d.format("%A, %B %-d")),
            DayKey::Date(d) if Some(d) == today.succ_opt() => {
                format!("Tomorrow · {}", d.format("%A, %B %-d"))
            }
            DayKey::Date(d) => d.format("%A, %B %-d").to_string(),
        }
    }
}

/// Buckets tasks by calendar day in `tz`, keeping only days from `today`
/// through `today + days`. Tasks without a due date form their own bucket,
/// which comes first.
pub fn group_upcoming_in<Tz: TimeZone>(
    tasks: Vec<Task>,
    today: NaiveDate,
    days: u32,
    tz: &Tz,
) -> Vec<DayBucket> {
    let last = today + Duration::days(i64::from(days));
    let mut buckets: BTreeMap<DayKey, Vec<Task>> = BTreeMap::new();

    for task in tasks {
        let key = match task.due_date {
            None => DayKey::NoDate,
            Some(due) => {
                let day = due.with_timezone(tz).date_naive();
                if day < today || day > last {
                    continue;
                }
                DayKey::Date(day)
            }
        };
        buckets.entry(key).or_default().push(task);
    }

    buckets
        .into_iter()
        .map(|(day, tasks)| DayBucket { day, tasks })
        .collect()
}

pub fn group_upcoming(tasks: Vec<Task>, days: u32) -> Vec<DayBucket> {
    group_upcoming_in(tasks, Local::now().date_naive(), days, &Local)
}

/// The last millisecond of `now`'s calendar day, in UTC.
pub fn end_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| now.timezone().from_local_datetime(&naive).latest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

pub fn end_of_today() -> DateTime<Utc> {
    end_of_day(&Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use chrono::{FixedOffset, Timelike};

    fn task(id: &str, due: Option<&str>) -> Task {
        let created = "2026-10-01T00:00:00Z".parse().unwrap();
        Task {
            id: id.to_string(),
            title: format!("task {}", id),
            description: None,
            project_id: None,
            user_id: "u1".to_string(),
            priority: 0,
            status: TaskStatus::Pending,
            progress: 0,
            due_date: due.map(|d| d.parse().unwrap()),
            reminder_at: None,
            created_at: created,
            updated_at: created,
            labels: Vec::new(),
        }
    }

    fn ids(bucket: &DayBucket) -> Vec<&str> {
        bucket.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_groups_sorted_with_dateless_first() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let tasks = vec![
            task("c", Some("2026-10-25T09:00:00Z")),
            task("a", Some("2026-10-18T12:00:00Z")),
            task("none", None),
            task("b", Some("2026-10-18T08:00:00Z")),
            task("d", Some("2026-10-20T10:00:00Z")),
        ];

        let buckets = group_upcoming_in(tasks, today, 14, &Utc);

        let keys: Vec<&DayKey> = buckets.iter().map(|b| &b.day).collect();
        assert_eq!(
            keys,
            vec![
                &DayKey::NoDate,
                &DayKey::Date(today),
                &DayKey::Date(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()),
                &DayKey::Date(NaiveDate::from_ymd_opt(2026, 10, 25).unwrap()),
            ]
        );
        // order within a day follows the server
        assert_eq!(ids(&buckets[1]), vec!["a", "b"]);
    }

    #[test]
    fn test_window_is_inclusive_and_bounded() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let tasks = vec![
            task("yesterday", Some("2026-10-17T23:00:00Z")),
            task("today", Some("2026-10-18T00:00:00Z")),
            task("last", Some("2026-11-01T23:59:00Z")),
            task("beyond", Some("2026-11-02T00:00:00Z")),
        ];

        let buckets = group_upcoming_in(tasks, today, 14, &Utc);
        let all: Vec<&str> = buckets.iter().flat_map(|b| ids(b)).collect();

        assert_eq!(all, vec!["today", "last"]);
    }

    #[test]
    fn test_grouping_uses_local_calendar_day() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();
        // 18:00 UTC on the 18th is already the 19th in UTC+8
        let tasks = vec![task("late", Some("2026-10-18T18:00:00Z"))];

        let buckets = group_upcoming_in(tasks, today, 14, &taipei);

        assert_eq!(buckets[0].day, DayKey::Date(today));
    }

    #[test]
    fn test_empty_input() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(group_upcoming_in(Vec::new(), today, 14, &Utc).is_empty());
    }

    #[test]
    fn test_end_of_day() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();

        let end = end_of_day(&now);

        assert_eq!(end.to_rfc3339(), "2026-10-18T15:59:59.999+00:00");
        assert_eq!(end.with_timezone(&offset).hour(), 23);
    }

    #[test]
    fn test_bucket_labels() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let bucket = |day| DayBucket {
            day,
            tasks: Vec::new(),
        };
        assert_eq!(bucket(DayKey::NoDate).label(today), "No date");
        assert!(bucket(DayKey::Date(today)).label(today).starts_with("Today"));
        assert_eq!(
            bucket(DayKey::Date(NaiveDate::from_ymd_opt(2026, 10, 21).unwrap())).label(today),
            "Wednesday, October 21"
        );
    }
}
