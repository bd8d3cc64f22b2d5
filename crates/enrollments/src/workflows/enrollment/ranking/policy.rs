use chrono::{DateTime, Datelike, Utc};

use crate::remote::BlockType;

/// Priority of a requirement, 0 (lowest) to 9.
///
/// Extra-block disciplines ignore `is_ahead`; only reservation timing moves them.
pub fn priority_score(block_type: BlockType, is_ahead: bool, is_reserved: bool) -> u8 {
    match (block_type, is_ahead, is_reserved) {
        (BlockType::Required, false, false) => 7,
        (BlockType::Required, false, true) => 9,
        (BlockType::Required, true, false) => 3,
        (BlockType::Required, true, true) => 6,
        (BlockType::Optional, false, false) => 4,
        (BlockType::Optional, false, true) => 8,
        (BlockType::Optional, true, false) => 2,
        (BlockType::Optional, true, true) => 5,
        (BlockType::Extra, _, false) => 0,
        (BlockType::Extra, _, true) => 1,
    }
}

/// Half of the academic year an instant falls in: 1 before mid-July, 2 from then on.
pub fn semester_index(at: DateTime<Utc>) -> i32 {
    match at.month() {
        1..=6 => 1,
        7 if at.day() < 15 => 1,
        _ => 2,
    }
}

/// Semesters elapsed since the student's catalog year, counting the current one.
pub fn user_semester(at: DateTime<Utc>, catalog_year: i32) -> i32 {
    (at.year() - catalog_year) * 2 + semester_index(at)
}
