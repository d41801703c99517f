//! Course pacing state
//!
//! Every order tracks five course slots. A slot starts at `Hold`,
//! moves to `Fired` when sent to preparation, and `Served` once on the
//! table. Only non-`Hold` slots are serialized, so the wire shape is a
//! sparse map like `{"1": "fired", "3": "hold"}` minus the holds.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

pub const COURSE_MIN: u8 = 1;
pub const COURSE_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseState {
    #[default]
    Hold,
    Fired,
    Served,
}

impl fmt::Display for CourseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CourseState::Hold => "hold",
            CourseState::Fired => "fired",
            CourseState::Served => "served",
        };
        f.write_str(s)
    }
}

/// Fixed board of the five course slots, indexed 1..=5.
///
/// Out-of-range course numbers read as `Hold` and are ignored on
/// write; callers validate the range before mutating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CourseBoard {
    slots: [CourseState; COURSE_MAX as usize],
}

impl CourseBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(course: u8) -> bool {
        (COURSE_MIN..=COURSE_MAX).contains(&course)
    }

    pub fn state(&self, course: u8) -> CourseState {
        if Self::contains(course) {
            self.slots[(course - 1) as usize]
        } else {
            CourseState::Hold
        }
    }

    pub fn set(&mut self, course: u8, state: CourseState) {
        if Self::contains(course) {
            self.slots[(course - 1) as usize] = state;
        }
    }

    /// `(course, state)` for every non-`Hold` slot, ascending.
    pub fn entries(&self) -> impl Iterator<Item = (u8, CourseState)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != CourseState::Hold)
            .map(|(i, s)| ((i + 1) as u8, *s))
    }
}

impl Serialize for CourseBoard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<(u8, CourseState)> = self.entries().collect();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (course, state) in entries {
            map.serialize_entry(&course.to_string(), &state)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CourseBoard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, CourseState>::deserialize(deserializer)?;
        let mut board = CourseBoard::new();
        for (key, state) in raw {
            let course: u8 = key
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid course key: {key}")))?;
            if !Self::contains(course) {
                return Err(D::Error::custom(format!("course out of range: {course}")));
            }
            board.set(course, state);
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_hold() {
        let board = CourseBoard::new();
        for course in COURSE_MIN..=COURSE_MAX {
            assert_eq!(board.state(course), CourseState::Hold);
        }
        assert_eq!(board.entries().count(), 0);
    }

    #[test]
    fn serializes_only_non_hold_slots() {
        let mut board = CourseBoard::new();
        board.set(1, CourseState::Served);
        board.set(3, CourseState::Fired);

        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json, serde_json::json!({"1": "served", "3": "fired"}));

        let back: CourseBoard = serde_json::from_value(json).unwrap();
        assert_eq!(back, board);
        assert_eq!(back.state(2), CourseState::Hold);
    }

    #[test]
    fn rejects_out_of_range_keys() {
        let err = serde_json::from_value::<CourseBoard>(serde_json::json!({"6": "fired"}));
        assert!(err.is_err());
    }

    #[test]
    fn out_of_range_access_is_inert() {
        let mut board = CourseBoard::new();
        board.set(0, CourseState::Fired);
        board.set(9, CourseState::Fired);
        assert_eq!(board.entries().count(), 0);
        assert_eq!(board.state(0), CourseState::Hold);
    }
}
