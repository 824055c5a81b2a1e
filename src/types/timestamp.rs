use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::result::{illegal_operation, illegal_operation_raw, IonResult};
use crate::types::Decimal;

/// Indicates the most precise time unit that has been specified in the accompanying [Timestamp].
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Default)]
pub enum Precision {
    /// Year-level precision (e.g. `2020T`)
    #[default]
    Year,
    /// Month-level precision (e.g. `2020-08T`)
    Month,
    /// Day-level precision (e.g. `2020-08-01T`)
    Day,
    /// Minute-level precision (e.g. `2020-08-01T12:34Z`)
    HourAndMinute,
    /// Second-level precision or greater. (e.g. `2020-08-01T12:34:56Z` or
    /// `2020-08-01T12:34:56.123456789Z`)
    Second,
}

// Ion offsets must be strictly less than a day in either direction.
const MAX_OFFSET_MINUTES: i32 = 24 * 60 - 1;

/// Represents a point in time to a specified degree of precision. Unlike `chrono`'s
/// [NaiveDateTime], a `Timestamp` has variable precision ranging from a year to fractional
/// seconds of an arbitrary unit, and an offset that may be unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    // Always stored in UTC; the local time is recovered by applying `offset`.
    pub(crate) date_time: NaiveDateTime,
    // Minutes east of UTC. `None` is the unknown offset, `-00:00`.
    pub(crate) offset: Option<i32>,
    pub(crate) precision: Precision,
    // Present only at `Precision::Second`, always in the range `[0, 1)`.
    pub(crate) fractional_seconds: Option<Decimal>,
}

/// The UTC components of a [Timestamp], in the order the binary encoding emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UtcFields {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Timestamp {
    /// Creates a builder for a Timestamp with at least year precision.
    pub fn with_year(year: u32) -> MonthSetter {
        MonthSetter {
            builder: TimestampBuilder {
                year,
                ..Default::default()
            },
        }
    }

    /// Creates a builder for a Timestamp with at least day precision.
    pub fn with_ymd(year: u32, month: u32, day: u32) -> HourAndMinuteSetter {
        Timestamp::with_year(year).with_month(month).with_day(day)
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Returns the offset from UTC in minutes, or `None` if the offset is unknown.
    pub fn offset(&self) -> Option<i32> {
        self.offset
    }

    pub fn fractional_seconds(&self) -> Option<&Decimal> {
        self.fractional_seconds.as_ref()
    }

    fn local_date_time(&self) -> NaiveDateTime {
        let offset = Duration::minutes(self.offset.unwrap_or(0) as i64);
        // Construction already proved that the local time is representable.
        self.date_time
            .checked_add_signed(offset)
            .unwrap_or(self.date_time)
    }

    pub fn year(&self) -> i32 {
        self.local_date_time().year()
    }

    pub fn month(&self) -> u32 {
        self.local_date_time().month()
    }

    pub fn day(&self) -> u32 {
        self.local_date_time().day()
    }

    pub fn hour(&self) -> u32 {
        self.local_date_time().hour()
    }

    pub fn minute(&self) -> u32 {
        self.local_date_time().minute()
    }

    pub fn second(&self) -> u32 {
        self.local_date_time().second()
    }

    pub(crate) fn utc_fields(&self) -> UtcFields {
        let utc = &self.date_time;
        UtcFields {
            year: utc.year() as u32,
            month: utc.month(),
            day: utc.day(),
            hour: utc.hour(),
            minute: utc.minute(),
            second: utc.second(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TimestampBuilder {
    precision: Precision,
    year: u32,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    second: Option<u32>,
    fractional_seconds: Option<Decimal>,
    offset: Option<i32>,
}

impl TimestampBuilder {
    fn build(self) -> IonResult<Timestamp> {
        if !(1..=9999).contains(&self.year) {
            return illegal_operation(format!("timestamp year {} is out of range", self.year));
        }
        let month = self.month.unwrap_or(1);
        let day = self.day.unwrap_or(1);
        let date = NaiveDate::from_ymd_opt(self.year as i32, month, day).ok_or_else(|| {
            illegal_operation_raw(format!(
                "{}-{}-{} is not a valid date",
                self.year, month, day
            ))
        })?;
        let (hour, minute, second) = (
            self.hour.unwrap_or(0),
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
        );
        let local = date.and_hms_opt(hour, minute, second).ok_or_else(|| {
            illegal_operation_raw(format!(
                "{hour:02}:{minute:02}:{second:02} is not a valid time of day"
            ))
        })?;

        // Date-only precisions cannot carry an offset.
        let offset = if self.precision >= Precision::HourAndMinute {
            self.offset
        } else {
            None
        };
        if let Some(minutes) = offset {
            if minutes.abs() > MAX_OFFSET_MINUTES {
                return illegal_operation(format!("offset of {minutes} minutes is out of range"));
            }
        }

        let fractional_seconds = match self.fractional_seconds {
            Some(fraction) if self.precision == Precision::Second => {
                if !fraction.is_fraction() {
                    return illegal_operation(format!(
                        "fractional seconds must be >= 0 and < 1, found {fraction}"
                    ));
                }
                Some(fraction)
            }
            _ => None,
        };

        let date_time = local
            .checked_sub_signed(Duration::minutes(offset.unwrap_or(0) as i64))
            .ok_or_else(|| illegal_operation_raw("timestamp is out of range once made UTC"))?;
        if !(1..=9999).contains(&date_time.year()) {
            return illegal_operation("timestamp year is out of range once made UTC");
        }

        Ok(Timestamp {
            date_time,
            offset,
            precision: self.precision,
            fractional_seconds,
        })
    }
}

/// Allows the user to set the `month` field on a builder that has already had its `year`
/// field set. Or, if `Year` is the desired precision, they may build the [Timestamp].
#[derive(Debug, Clone)]
pub struct MonthSetter {
    builder: TimestampBuilder,
}

impl MonthSetter {
    // 1-indexed month
    pub fn with_month(self, month: u32) -> DaySetter {
        let mut builder = self.builder;
        builder.precision = Precision::Month;
        builder.month = Some(month);
        DaySetter { builder }
    }

    pub fn build(self) -> IonResult<Timestamp> {
        self.builder.build()
    }
}

/// Allows the user to set the `day` field on a builder that has already had its `year`
/// and `month` fields set.
#[derive(Debug, Clone)]
pub struct DaySetter {
    builder: TimestampBuilder,
}

impl DaySetter {
    // 1-indexed day
    pub fn with_day(self, day: u32) -> HourAndMinuteSetter {
        let mut builder = self.builder;
        builder.precision = Precision::Day;
        builder.day = Some(day);
        HourAndMinuteSetter { builder }
    }

    pub fn build(self) -> IonResult<Timestamp> {
        self.builder.build()
    }
}

/// Allows the user to set the `hour` and `minute` fields on a builder that has already
/// had its `year`, `month`, and `day` fields set.
#[derive(Debug, Clone)]
pub struct HourAndMinuteSetter {
    builder: TimestampBuilder,
}

impl HourAndMinuteSetter {
    pub fn with_hms(self, hour: u32, minute: u32, second: u32) -> FractionalSecondSetter {
        self.with_hour_and_minute(hour, minute).with_second(second)
    }

    pub fn with_hour_and_minute(self, hour: u32, minute: u32) -> SecondSetter {
        let mut builder = self.builder;
        builder.precision = Precision::HourAndMinute;
        builder.hour = Some(hour);
        builder.minute = Some(minute);
        SecondSetter { builder }
    }

    pub fn build(self) -> IonResult<Timestamp> {
        self.builder.build()
    }
}

/// Allows the user to set the `second` field, or to build a minute-precision [Timestamp]
/// with a known or unknown offset.
#[derive(Debug, Clone)]
pub struct SecondSetter {
    builder: TimestampBuilder,
}

impl SecondSetter {
    pub fn with_second(self, second: u32) -> FractionalSecondSetter {
        let mut builder = self.builder;
        builder.precision = Precision::Second;
        builder.second = Some(second);
        FractionalSecondSetter { builder }
    }

    /// Sets the difference, in minutes, from UTC. A positive value indicates
    /// Eastern Hemisphere, while a negative value indicates Western Hemisphere.
    pub fn build_at_offset(mut self, offset_minutes: i32) -> IonResult<Timestamp> {
        self.builder.offset = Some(offset_minutes);
        self.builder.build()
    }

    pub fn build_at_unknown_offset(mut self) -> IonResult<Timestamp> {
        self.builder.offset = None;
        self.builder.build()
    }
}

/// Allows the user to set the fractional seconds of a second-precision [Timestamp].
#[derive(Debug, Clone)]
pub struct FractionalSecondSetter {
    builder: TimestampBuilder,
}

impl FractionalSecondSetter {
    pub fn with_milliseconds(self, milliseconds: u32) -> FractionalSecondSetter {
        self.with_fractional_seconds(Decimal::new(milliseconds, -3))
    }

    pub fn with_microseconds(self, microseconds: u32) -> FractionalSecondSetter {
        self.with_fractional_seconds(Decimal::new(microseconds, -6))
    }

    pub fn with_nanoseconds(self, nanoseconds: u32) -> FractionalSecondSetter {
        self.with_fractional_seconds(Decimal::new(nanoseconds, -9))
    }

    pub fn with_fractional_seconds(self, fractional_seconds: Decimal) -> FractionalSecondSetter {
        let mut builder = self.builder;
        builder.fractional_seconds = Some(fractional_seconds);
        FractionalSecondSetter { builder }
    }

    pub fn build_at_offset(mut self, offset_minutes: i32) -> IonResult<Timestamp> {
        self.builder.offset = Some(offset_minutes);
        self.builder.build()
    }

    pub fn build_at_unknown_offset(mut self) -> IonResult<Timestamp> {
        self.builder.offset = None;
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[test]
    fn utc_fields_apply_the_offset() -> IonResult<()> {
        let timestamp = Timestamp::with_ymd(2021, 1, 8)
            .with_hour_and_minute(23, 30)
            .build_at_offset(-5 * 60)?;
        let utc = timestamp.utc_fields();
        assert_eq!((utc.year, utc.month, utc.day), (2021, 1, 9));
        assert_eq!((utc.hour, utc.minute), (4, 30));
        assert_eq!((timestamp.day(), timestamp.hour()), (8, 23));
        assert_eq!(timestamp.offset(), Some(-300));
        Ok(())
    }

    #[test]
    fn date_precision_drops_offset() -> IonResult<()> {
        let timestamp = Timestamp::with_ymd(2021, 2, 28).build()?;
        assert_eq!(timestamp.precision(), Precision::Day);
        assert_eq!(timestamp.offset(), None);
        Ok(())
    }

    #[test]
    fn milliseconds_become_a_decimal_fraction() -> IonResult<()> {
        let timestamp = Timestamp::with_ymd(2021, 1, 8)
            .with_hms(14, 12, 36)
            .with_milliseconds(888)
            .build_at_unknown_offset()?;
        assert_eq!(timestamp.fractional_seconds(), Some(&Decimal::new(888, -3)));
        Ok(())
    }

    #[rstest]
    #[case::bad_month(Timestamp::with_year(2021).with_month(13).build())]
    #[case::bad_day(Timestamp::with_ymd(2021, 2, 30).build())]
    #[case::bad_hour(Timestamp::with_ymd(2021, 2, 3).with_hour_and_minute(24, 0).build_at_offset(0))]
    #[case::bad_offset(Timestamp::with_ymd(2021, 2, 3).with_hour_and_minute(1, 0).build_at_offset(24 * 60))]
    #[case::bad_fraction(Timestamp::with_ymd(2021, 2, 3).with_hms(1, 0, 0).with_milliseconds(1000).build_at_offset(0))]
    #[case::year_zero(Timestamp::with_year(0).build())]
    fn invalid_timestamps_are_rejected(#[case] result: IonResult<Timestamp>) {
        assert!(result.is_err());
    }
}
