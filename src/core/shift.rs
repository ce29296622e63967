//! Nursing shifts and the edit window applied to nursing documentation.
//!
//! Every nursing mutation goes through [`EditPolicy::check`] or
//! [`ensure_current_shift`]; no handler computes time windows on its own.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MORNING_START: u32 = 7;
const AFTERNOON_START: u32 = 13;
const NIGHT_START: u32 = 19;

/// Fixed daily time band used to group nursing documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Shift {
    /// 07:00 to 12:59
    Morning,
    /// 13:00 to 18:59
    Afternoon,
    /// 19:00 to 06:59 of the next day
    Night,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::Morning, Shift::Afternoon, Shift::Night];

    /// Classifies a wall-clock time. Depends on the hour only.
    pub fn of(time: NaiveTime) -> Shift {
        match time.hour() {
            h if (MORNING_START..AFTERNOON_START).contains(&h) => Shift::Morning,
            h if (AFTERNOON_START..NIGHT_START).contains(&h) => Shift::Afternoon,
            _ => Shift::Night,
        }
    }

    fn start_hour(self) -> u32 {
        match self {
            Shift::Morning => MORNING_START,
            Shift::Afternoon => AFTERNOON_START,
            Shift::Night => NIGHT_START,
        }
    }

    fn length(self) -> Duration {
        match self {
            Shift::Morning | Shift::Afternoon => Duration::hours(6),
            Shift::Night => Duration::hours(12),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Afternoon => "afternoon",
            Shift::Night => "night",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "mañana" | "manana" => Ok(Shift::Morning),
            "afternoon" | "tarde" => Ok(Shift::Afternoon),
            "night" | "noche" => Ok(Shift::Night),
            other => Err(format!("unknown shift '{}'", other)),
        }
    }
}

/// One concrete occurrence of a shift. A night window is dated by the
/// evening it starts on, so 03:00 belongs to the previous day's night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftWindow {
    pub shift: Shift,
    pub date: NaiveDate,
}

impl ShiftWindow {
    pub fn containing(ts: NaiveDateTime) -> Self {
        let shift = Shift::of(ts.time());
        let date = if shift == Shift::Night && ts.hour() < MORNING_START {
            ts.date().pred_opt().unwrap_or(ts.date())
        } else {
            ts.date()
        };
        ShiftWindow { shift, date }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.shift.start_hour()))
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start() + self.shift.length()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start() <= ts && ts < self.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShiftDenial {
    #[error("cannot file a {requested} shift entry outside its hours; the open shift is {current}")]
    WrongShift { requested: Shift, current: Shift },
    #[error("entry filed at {filed_at} is dated in the future")]
    FutureEntry { filed_at: NaiveDateTime },
    #[error("the {shift} shift of {filed_at} is closed and the edit grace period has passed")]
    WindowClosed { shift: Shift, filed_at: NaiveDateTime },
}

/// New nursing entries may only be filed for the shift open at `now`.
pub fn ensure_current_shift(now: NaiveDateTime, requested: Option<Shift>) -> Result<Shift, ShiftDenial> {
    let current = Shift::of(now.time());
    match requested {
        Some(requested) if requested != current => Err(ShiftDenial::WrongShift { requested, current }),
        _ => Ok(current),
    }
}

/// Edit gate for existing nursing entries.
#[derive(Debug, Clone, Copy)]
pub struct EditPolicy {
    pub grace: Duration,
}

impl EditPolicy {
    pub fn new(grace_minutes: i64) -> Self {
        EditPolicy { grace: Duration::minutes(grace_minutes.max(0)) }
    }

    /// An entry is editable while the shift window it was filed in is still
    /// open, or within `grace` of filing. Entries dated after `now` never are.
    pub fn check(&self, now: NaiveDateTime, filed_at: NaiveDateTime, shift: Shift) -> Result<(), ShiftDenial> {
        if filed_at > now {
            return Err(ShiftDenial::FutureEntry { filed_at });
        }

        let window = ShiftWindow::containing(filed_at);
        let same_window = window.shift == shift && window.contains(now);
        if same_window || now - filed_at <= self.grace {
            Ok(())
        } else {
            Err(ShiftDenial::WindowClosed { shift, filed_at })
        }
    }
}

impl Default for EditPolicy {
    fn default() -> Self {
        EditPolicy::new(120)
    }
}
