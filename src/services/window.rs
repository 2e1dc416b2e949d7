use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// First through last day of a calendar month. `None` for an invalid month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self { start, end })
    }

    /// From `days` days back through `today`, both ends included, so a
    /// week spans eight calendar dates.
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    /// The window of equal length ending the day before this one starts.
    pub fn preceding(&self) -> Self {
        let len = self.len_days();
        let end = self.start - Duration::days(1);
        Self {
            start: end - Duration::days(len - 1),
            end,
        }
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Length selector for the insights view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightPeriod {
    Week,
    #[default]
    Month,
    Quarter,
}

impl InsightPeriod {
    pub fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    pub fn window_ending(self, today: NaiveDate) -> DateWindow {
        DateWindow::trailing(today, self.days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let jan = DateWindow::month(2024, 1).unwrap();
        assert_eq!(jan, DateWindow::new(date(2024, 1, 1), date(2024, 1, 31)));

        let leap_feb = DateWindow::month(2024, 2).unwrap();
        assert_eq!(leap_feb.end, date(2024, 2, 29));

        let feb = DateWindow::month(2023, 2).unwrap();
        assert_eq!(feb.end, date(2023, 2, 28));

        let dec = DateWindow::month(2023, 12).unwrap();
        assert_eq!(dec.end, date(2023, 12, 31));
    }

    #[test]
    fn test_invalid_month() {
        assert!(DateWindow::month(2024, 0).is_none());
        assert!(DateWindow::month(2024, 13).is_none());
    }

    #[test]
    fn test_trailing_window_reaches_back_full_period() {
        let week = InsightPeriod::Week.window_ending(date(2024, 1, 15));
        assert_eq!(week.start, date(2024, 1, 8));
        assert_eq!(week.end, date(2024, 1, 15));
        assert!(week.contains(date(2024, 1, 8)));
        assert_eq!(week.len_days(), 8);

        assert_eq!(InsightPeriod::Month.window_ending(date(2024, 1, 31)).start, date(2024, 1, 1));
        assert_eq!(InsightPeriod::Quarter.window_ending(date(2024, 3, 30)).len_days(), 91);
        assert_eq!(DateWindow::trailing(date(2024, 1, 15), 0).len_days(), 1);
    }

    #[test]
    fn test_preceding_window_is_adjacent_and_equal_length() {
        let current = InsightPeriod::Month.window_ending(date(2024, 3, 1));
        let previous = current.preceding();

        assert_eq!(previous.end, current.start - Duration::days(1));
        assert_eq!(previous.len_days(), current.len_days());
        assert!(!previous.contains(current.start));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let w = DateWindow::new(date(2024, 1, 1), date(2024, 1, 31));
        assert!(w.contains(date(2024, 1, 1)));
        assert!(w.contains(date(2024, 1, 31)));
        assert!(!w.contains(date(2024, 2, 1)));
    }
}
