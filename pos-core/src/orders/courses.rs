//! Course state machine
//!
//! Legal transitions per course slot:
//!
//! | from | to | operation |
//! |------|----|-----------|
//! | hold | fired | `fire` |
//! | fired | hold | `cancel_fire` |
//! | fired | served | `mark_served` |
//! | served | fired | `reopen` |
//!
//! Firing an already-fired course is a no-op, not an error, because
//! two terminals may race on the same button. A served course can
//! never be re-fired except through the explicit `reopen` correction.

use shared::order::{CourseBoard, CourseState, Order};

use super::OrderError;

pub fn validate_course(course: u8) -> Result<(), OrderError> {
    if CourseBoard::contains(course) {
        Ok(())
    } else {
        Err(OrderError::InvalidCourse(course))
    }
}

/// Send a course to preparation. Returns whether anything changed.
pub fn fire(order: &mut Order, course: u8) -> Result<bool, OrderError> {
    validate_course(course)?;
    match order.course_status.state(course) {
        CourseState::Served => Err(OrderError::CourseAlreadyServed(course)),
        CourseState::Fired => Ok(false),
        CourseState::Hold => {
            order.course_status.set(course, CourseState::Fired);
            Ok(true)
        }
    }
}

/// Pull a fired course back to hold before the kitchen starts on it.
/// Cancelling a course already on hold is a no-op, like firing twice.
pub fn cancel_fire(order: &mut Order, course: u8) -> Result<bool, OrderError> {
    validate_course(course)?;
    match order.course_status.state(course) {
        CourseState::Served => Err(OrderError::CourseAlreadyServed(course)),
        CourseState::Hold => Ok(false),
        CourseState::Fired => {
            order.course_status.set(course, CourseState::Hold);
            Ok(true)
        }
    }
}

/// Preparation done, course is on the table.
pub fn mark_served(order: &mut Order, course: u8) -> Result<(), OrderError> {
    validate_course(course)?;
    match order.course_status.state(course) {
        CourseState::Served => Err(OrderError::CourseAlreadyServed(course)),
        CourseState::Hold => Err(OrderError::CourseNotFired(course)),
        CourseState::Fired => {
            order.course_status.set(course, CourseState::Served);
            Ok(())
        }
    }
}

/// Kitchen-side correction: put a served course back on the fire.
pub fn reopen(order: &mut Order, course: u8) -> Result<(), OrderError> {
    validate_course(course)?;
    match order.course_status.state(course) {
        CourseState::Served => {
            order.course_status.set(course, CourseState::Fired);
            Ok(())
        }
        _ => Err(OrderError::CourseNotServed(course)),
    }
}

/// First course that has items and has not been fired or served yet.
pub fn next_course_to_fire(order: &Order) -> Option<u8> {
    order
        .courses_present()
        .into_iter()
        .find(|&course| order.course_status.state(course) == CourseState::Hold)
}
