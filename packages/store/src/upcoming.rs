//! # Upcoming birthdays — projection, ordering and month grouping
//!
//! Everything here is a pure function of its inputs. Callers capture "today" once and
//! pass the same date to every stage so that filtering, sorting and grouping agree on
//! where the day boundary is. Nothing computed here is ever stored.
//!
//! ## Stages
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`next_occurrence`] | Projects a recurring date onto the first matching day on or after today. |
//! | [`upcoming`] | Splits people into pinned and unpinned, applies the category filter and cap to the unpinned side, projects and sorts both, and puts pinned first. |
//! | [`group_by_month`] | Buckets an ordered list by the month name of each projected date, keeping first-appearance order. |
//!
//! ## February 29
//!
//! In years without a leap day, a February 29 birthday is observed on February 28.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Person;

/// A person annotated with their next birthday relative to a reference day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpcomingBirthday {
    #[serde(flatten)]
    pub person: Person,
    pub next_birthday: NaiveDate,
    /// 0 when the birthday is today.
    pub days_until: i64,
    /// Age reached on `next_birthday`.
    pub turning: i32,
}

impl UpcomingBirthday {
    pub fn project(person: &Person, today: NaiveDate) -> Self {
        let next_birthday = next_occurrence(person.birthday, today);
        Self {
            days_until: (next_birthday - today).num_days(),
            turning: next_birthday.year() - person.birthday.year(),
            next_birthday,
            person: person.clone(),
        }
    }

    pub fn is_today(&self) -> bool {
        self.days_until == 0
    }
}

/// All birthdays whose projected date falls in one month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthGroup {
    /// Full English month name: "January".
    pub month: String,
    pub people: Vec<UpcomingBirthday>,
}

/// Parameters of one [`upcoming`] pass.
#[derive(Clone, Debug, PartialEq)]
pub struct UpcomingQuery {
    pub today: NaiveDate,
    /// Category name to filter unpinned people by, compared case-insensitively.
    pub category: Option<String>,
    /// Maximum number of unpinned people returned.
    pub limit: Option<usize>,
}

impl UpcomingQuery {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            category: None,
            limit: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The earliest date on or after `today` with the month and day of `birthday`.
pub fn next_occurrence(birthday: NaiveDate, today: NaiveDate) -> NaiveDate {
    let this_year = in_year(birthday, today.year());
    if this_year < today {
        in_year(birthday, today.year() + 1)
    } else {
        this_year
    }
}

/// Move `date` into `year`, observing February 29 on February 28 in common years.
fn in_year(date: NaiveDate, year: i32) -> NaiveDate {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        // only reachable outside chrono's representable range
        .unwrap_or(NaiveDate::MAX)
}

/// Order `people` for display: pinned first, then the (optionally filtered and
/// capped) rest, each side soonest-first with ties kept in input order.
///
/// Pinned people ignore both the category filter and the cap.
pub fn upcoming(people: &[Person], query: &UpcomingQuery) -> Vec<UpcomingBirthday> {
    let today = query.today;
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let (pinned, unpinned): (Vec<&Person>, Vec<&Person>) =
        people.iter().partition(|p| p.pinned);

    let mut pinned: Vec<UpcomingBirthday> = pinned
        .into_iter()
        .map(|p| UpcomingBirthday::project(p, today))
        .collect();

    let mut rest: Vec<UpcomingBirthday> = unpinned
        .into_iter()
        .filter(|p| category.map_or(true, |c| p.has_category(c)))
        .map(|p| UpcomingBirthday::project(p, today))
        .collect();

    // sort_by_key is stable
    pinned.sort_by_key(|u| u.next_birthday);
    rest.sort_by_key(|u| u.next_birthday);

    if let Some(limit) = query.limit {
        rest.truncate(limit);
    }

    pinned.extend(rest);
    pinned
}

/// Partition an ordered list into month buckets.
pub fn group_by_month(list: Vec<UpcomingBirthday>) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();
    for entry in list {
        let month = entry.next_birthday.format("%B").to_string();
        match groups.iter_mut().find(|g| g.month == month) {
            Some(group) => group.people.push(entry),
            None => groups.push(MonthGroup {
                month,
                people: vec![entry],
            }),
        }
    }
    groups
}
