use chrono::NaiveDate;
use model::{
    core::{
        identifiers::EntityName,
        time::{end_of_day, start_of_day},
    },
    requests::window::{LoadType, WindowMessage},
};

/// Lazy, ordered sequence of windows for one load request.
///
/// Cloning yields an independent sequence that starts over from the first
/// window the cloned-from sequence has not consumed yet.
#[derive(Debug, Clone)]
pub struct Windows {
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    Single(Option<WindowMessage>),
    Daily(DailyWindows),
}

impl Windows {
    pub fn empty() -> Self {
        Windows {
            inner: Inner::Single(None),
        }
    }

    pub fn single(window: WindowMessage) -> Self {
        Windows {
            inner: Inner::Single(Some(window)),
        }
    }

    pub fn daily(days: DailyWindows) -> Self {
        Windows {
            inner: Inner::Daily(days),
        }
    }
}

impl Iterator for Windows {
    type Item = WindowMessage;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Single(window) => window.take(),
            Inner::Daily(days) => days.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Inner::Single(window) => {
                let n = usize::from(window.is_some());
                (n, Some(n))
            }
            Inner::Daily(days) => days.size_hint(),
        }
    }
}

impl ExactSizeIterator for Windows {}

/// One `[00:00:00.000, 23:59:59.999]` window per calendar day, first to last inclusive.
#[derive(Debug, Clone)]
pub struct DailyWindows {
    entity: EntityName,
    next_day: Option<NaiveDate>,
    last_day: NaiveDate,
    limit: Option<u32>,
    max_size_mb: Option<u32>,
}

impl DailyWindows {
    pub fn new(entity: EntityName, first_day: NaiveDate, last_day: NaiveDate) -> Self {
        DailyWindows {
            entity,
            next_day: (first_day <= last_day).then_some(first_day),
            last_day,
            limit: None,
            max_size_mb: None,
        }
    }

    pub fn with_limits(mut self, limit: Option<u32>, max_size_mb: Option<u32>) -> Self {
        self.limit = limit;
        self.max_size_mb = max_size_mb;
        self
    }

    fn remaining(&self) -> usize {
        self.next_day
            .map(|day| (self.last_day - day).num_days() as usize + 1)
            .unwrap_or(0)
    }
}

impl Iterator for DailyWindows {
    type Item = WindowMessage;

    fn next(&mut self) -> Option<Self::Item> {
        let day = self.next_day?;
        self.next_day = day.succ_opt().filter(|next| *next <= self.last_day);

        let window = WindowMessage::new(
            &self.entity,
            LoadType::Initial,
            start_of_day(day),
            end_of_day(day),
        )
        .with_limits(self.limit, self.max_size_mb);

        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}
