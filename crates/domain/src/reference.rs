//! Human-readable order reference codes.
//!
//! A reference is a three-letter date prefix followed by the time of day:
//!
//! ```text
//! 5  C  B  14 05 09 0123
//! |  |  |  |  |  |  `-- milliseconds, four digits
//! |  |  |  `--`--`----- hour, minute, second
//! |  |  `-------------- year, 'A' = 2023, wrapping every 26 years
//! |  `----------------- month, 'A' = January
//! `-------------------- day, '1'..'9' then 'A' = 10th
//! ```

use chrono::{Datelike, Timelike};

const EPOCH_YEAR: i32 = 2023;

fn letter(offset: u32) -> char {
    char::from(b'A' + (offset % 26) as u8)
}

fn day_code(day: u32) -> char {
    if day < 10 {
        char::from(b'0' + day as u8)
    } else {
        letter(day - 10)
    }
}

/// Builds the reference code for an order created at `now`.
///
/// Deterministic for a given instant: two orders in the same millisecond
/// share a reference.
pub fn generate_reference<T: Datelike + Timelike>(now: &T) -> String {
    let year_offset = (now.year() - EPOCH_YEAR).rem_euclid(26) as u32;
    let millis = now.nanosecond() / 1_000_000;

    format!(
        "{}{}{}{:02}{:02}{:02}{:04}",
        day_code(now.day()),
        letter(now.month0()),
        letter(year_offset),
        now.hour(),
        now.minute(),
        now.second(),
        millis,
    )
}
