//! Window aggregation for the insights and history views.
//!
//! Everything here is pure: the journal fetches the hydrated logs and these
//! functions only read them.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::collection::HydratedLog;
use crate::services::window::{DateWindow, InsightPeriod};

/// Frequency ratio above which a food is a high-severity trigger.
pub const HIGH_SEVERITY_RATIO: f64 = 0.5;
/// Frequency ratio at or above which a food is a medium-severity trigger.
pub const MEDIUM_SEVERITY_RATIO: f64 = 0.25;

/// How repeated names inside one day's list are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every stored row counts.
    #[default]
    CountEach,
    /// A name counts at most once per day.
    OncePerDay,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsightOptions {
    pub duplicates: DuplicatePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Occurrences per logged day. Zero when nothing was logged.
pub fn frequency_ratio(occurrences: u32, logged_days: u32) -> f64 {
    if logged_days == 0 {
        return 0.0;
    }
    f64::from(occurrences) / f64::from(logged_days)
}

/// Band a frequency ratio: `> 0.5` High, `0.25..=0.5` Medium, below that Low.
pub fn severity_for(ratio: f64) -> Severity {
    if ratio > HIGH_SEVERITY_RATIO {
        Severity::High
    } else if ratio >= MEDIUM_SEVERITY_RATIO {
        Severity::Medium
    } else {
        Severity::Low
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Names that count for one day's list under `policy`, normalized.
fn counted_names(names: &[String], policy: DuplicatePolicy) -> Vec<(String, &str)> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter_map(|raw| {
            let key = normalize(raw);
            if key.is_empty() {
                return None;
            }
            if policy == DuplicatePolicy::OncePerDay && !seen.insert(key.clone()) {
                return None;
            }
            Some((key, raw.trim()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub logged_days: u32,
    pub average_mood: Option<f64>,
    pub average_water: Option<f64>,
    pub total_symptoms: u32,
    pub symptom_rate: Option<f64>,
    pub exercise_days: u32,
}

pub fn summarize(logs: &[HydratedLog], options: InsightOptions) -> WindowMetrics {
    let logged_days = logs.len() as u32;
    let total_symptoms: u32 = logs
        .iter()
        .map(|l| counted_names(&l.lists.symptoms, options.duplicates).len() as u32)
        .sum();
    let exercise_days = logs
        .iter()
        .filter(|l| !l.log.exercise.trim().is_empty())
        .count() as u32;

    let mean = |total: i64| {
        (logged_days > 0).then(|| round2(total as f64 / f64::from(logged_days)))
    };

    WindowMetrics {
        logged_days,
        average_mood: mean(logs.iter().map(|l| i64::from(l.log.mood)).sum()),
        average_water: mean(logs.iter().map(|l| i64::from(l.log.water_intake)).sum()),
        total_symptoms,
        symptom_rate: mean(i64::from(total_symptoms)),
        exercise_days,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AverageMood,
    AverageWater,
    SymptomFrequency,
    ExerciseDays,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::AverageMood,
        Metric::SymptomFrequency,
        Metric::AverageWater,
        Metric::ExerciseDays,
    ];

    pub fn polarity(self) -> Polarity {
        match self {
            Self::SymptomFrequency => Polarity::LowerIsBetter,
            Self::AverageMood | Self::AverageWater | Self::ExerciseDays => {
                Polarity::HigherIsBetter
            }
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::AverageMood => "Average Mood",
            Self::AverageWater => "Water Intake",
            Self::SymptomFrequency => "Symptom Frequency",
            Self::ExerciseDays => "Exercise Days",
        }
    }

    /// The metric's value, or `None` when the window has no logs.
    pub fn value(self, metrics: &WindowMetrics) -> Option<f64> {
        if metrics.logged_days == 0 {
            return None;
        }
        match self {
            Self::AverageMood => metrics.average_mood,
            Self::AverageWater => metrics.average_water,
            Self::SymptomFrequency => metrics.symptom_rate,
            Self::ExerciseDays => Some(f64::from(metrics.exercise_days)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTrend {
    pub metric: Metric,
    pub title: &'static str,
    pub value: Option<f64>,
    pub previous: Option<f64>,
    /// Signed percent change against the previous window.
    pub change_percent: Option<f64>,
    pub improving: Option<bool>,
}

pub fn trend(metric: Metric, current: &WindowMetrics, previous: &WindowMetrics) -> MetricTrend {
    let value = metric.value(current);
    let prior = metric.value(previous);

    let (change_percent, improving) = match (value, prior) {
        (Some(now), Some(before)) => {
            let change = (before != 0.0).then(|| round2((now - before) / before.abs() * 100.0));
            let improving = match metric.polarity() {
                Polarity::HigherIsBetter => now > before,
                Polarity::LowerIsBetter => now < before,
            };
            (change, Some(improving))
        }
        _ => (None, None),
    };

    MetricTrend {
        metric,
        title: metric.title(),
        value,
        previous: prior,
        change_percent,
        improving,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedName {
    pub name: String,
    pub occurrences: u32,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerFood {
    pub food: String,
    pub occurrences: u32,
    pub ratio: f64,
    pub severity: Severity,
}

/// Group names case-insensitively and rank them by count, then by name.
///
/// The display name is the first spelling seen, trimmed.
pub fn rank_names<'a, I>(lists: I, logged_days: u32, policy: DuplicatePolicy) -> Vec<RankedName>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut groups: HashMap<String, (String, u32)> = HashMap::new();
    for names in lists {
        for (key, display) in counted_names(names, policy) {
            groups
                .entry(key)
                .or_insert_with(|| (display.to_string(), 0))
                .1 += 1;
        }
    }

    let mut ranked: Vec<(String, String, u32)> = groups
        .into_iter()
        .map(|(key, (display, count))| (key, display, count))
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .map(|(_, name, occurrences)| RankedName {
            name,
            occurrences,
            ratio: round2(frequency_ratio(occurrences, logged_days)),
        })
        .collect()
}

pub fn trigger_foods(logs: &[HydratedLog], options: InsightOptions) -> Vec<TriggerFood> {
    let logged_days = logs.len() as u32;
    rank_names(
        logs.iter().map(|l| l.lists.foods.as_slice()),
        logged_days,
        options.duplicates,
    )
    .into_iter()
    .map(|r| TriggerFood {
        severity: severity_for(frequency_ratio(r.occurrences, logged_days)),
        food: r.name,
        occurrences: r.occurrences,
        ratio: r.ratio,
    })
    .collect()
}

/// Averages for one day of the week across a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayStats {
    pub weekday: Weekday,
    pub logged_days: u32,
    pub average_mood: f64,
    pub symptom_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayPattern {
    /// Weekdays with at least one log, Monday first.
    pub days: Vec<WeekdayStats>,
    /// Highest average mood; fewer symptoms breaks ties.
    pub best_day: Option<Weekday>,
    /// Lowest average mood; more symptoms breaks ties.
    pub challenging_day: Option<Weekday>,
}

/// Group logs by day of the week.
///
/// Best and challenging days are only named once logs cover at least two
/// different weekdays.
pub fn weekday_pattern(logs: &[HydratedLog], options: InsightOptions) -> WeekdayPattern {
    // (logs, mood total, symptom total) indexed from Monday
    let mut buckets = [(0u32, 0i64, 0u32); 7];
    for l in logs {
        let bucket = &mut buckets[l.log.log_date.weekday().num_days_from_monday() as usize];
        bucket.0 += 1;
        bucket.1 += i64::from(l.log.mood);
        bucket.2 += counted_names(&l.lists.symptoms, options.duplicates).len() as u32;
    }

    let mut weekday = Weekday::Mon;
    let mut days = Vec::new();
    for (count, mood, symptoms) in buckets {
        if count > 0 {
            days.push(WeekdayStats {
                weekday,
                logged_days: count,
                average_mood: round2(mood as f64 / f64::from(count)),
                symptom_rate: round2(frequency_ratio(symptoms, count)),
            });
        }
        weekday = weekday.succ();
    }

    let (best_day, challenging_day) = if days.len() < 2 {
        (None, None)
    } else {
        let by_score = |a: &&WeekdayStats, b: &&WeekdayStats| {
            a.average_mood
                .total_cmp(&b.average_mood)
                .then_with(|| b.symptom_rate.total_cmp(&a.symptom_rate))
        };
        // min_by/max_by keep the earliest weekday on a full tie.
        let best = days
            .iter()
            .rev()
            .max_by(by_score)
            .map(|d| d.weekday);
        let worst = days.iter().min_by(by_score).map(|d| d.weekday);
        (best, worst)
    };

    WeekdayPattern {
        days,
        best_day,
        challenging_day,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub period: InsightPeriod,
    pub window: DateWindow,
    pub previous_window: DateWindow,
    pub logged_days: u32,
    pub metrics: Vec<MetricTrend>,
    pub trigger_foods: Vec<TriggerFood>,
    pub top_symptoms: Vec<RankedName>,
    pub weekday_pattern: WeekdayPattern,
}

/// Build the report for `current` (logs inside `window`) against `previous`
/// (logs inside the preceding window of equal length).
pub fn build_report(
    period: InsightPeriod,
    window: DateWindow,
    current: &[HydratedLog],
    previous: &[HydratedLog],
    options: InsightOptions,
) -> InsightReport {
    debug_assert!(current.iter().all(|l| window.contains(l.log.log_date)));
    let now = summarize(current, options);
    let before = summarize(previous, options);

    InsightReport {
        period,
        window,
        previous_window: window.preceding(),
        logged_days: now.logged_days,
        metrics: Metric::ALL
            .into_iter()
            .map(|m| trend(m, &now, &before))
            .collect(),
        trigger_foods: trigger_foods(current, options),
        top_symptoms: rank_names(
            current.iter().map(|l| l.lists.symptoms.as_slice()),
            now.logged_days,
            options.duplicates,
        ),
        weekday_pattern: weekday_pattern(current, options),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub days_logged: u32,
    pub average_mood: Option<f64>,
    pub average_water: Option<f64>,
}

pub fn month_summary(logs: &[HydratedLog]) -> MonthSummary {
    let metrics = summarize(logs, InsightOptions::default());
    MonthSummary {
        days_logged: metrics.logged_days,
        average_mood: metrics.average_mood,
        average_water: metrics.average_water,
    }
}
