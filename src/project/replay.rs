//! Replaying history structure over a list of item identities
//!
//! Project files reference items by their index at the time a record
//! applies, the live model references them by uuid. Converting between the
//! two means walking the history from the live item list: applied states
//! backwards (undoing each record), unapplied states forwards (redoing each
//! record), tracking only which identity sits at which index.

use std::fmt::Debug;

use crate::error::{GraphsError, Result};

/// Replay direction for a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The record is being undone
    Backward,
    /// The record is being redone
    Forward,
}

pub fn inconsistent(detail: impl Into<String>) -> GraphsError {
    GraphsError::ProjectParse(format!(
        "history does not match the project: {}",
        detail.into()
    ))
}

/// Visit every record of `batches` in replay order
///
/// The first `applied` batches are visited last-to-first with their records
/// reversed, starting from `live`. The remaining batches are visited in order,
/// again starting from `live`. `visit` receives the batch index, the record
/// index, the identity list as it is when the record applies, and the
/// direction; it must perform the record's structural change on the list.
pub fn walk<T, F>(batch_lens: &[usize], applied: usize, live: &[T], mut visit: F) -> Result<()>
where
    T: Clone,
    F: FnMut(usize, usize, &mut Vec<T>, Direction) -> Result<()>,
{
    let applied = applied.min(batch_lens.len());
    let mut list = live.to_vec();
    for state in (0..applied).rev() {
        for record in (0..batch_lens[state]).rev() {
            visit(state, record, &mut list, Direction::Backward)?;
        }
    }
    let mut list = live.to_vec();
    for (state, &len) in batch_lens.iter().enumerate().skip(applied) {
        for record in 0..len {
            visit(state, record, &mut list, Direction::Forward)?;
        }
    }
    Ok(())
}

/// Position of `id` in `list`
pub fn find<T: PartialEq + Debug>(list: &[T], id: &T) -> Result<usize> {
    list.iter()
        .position(|x| x == id)
        .ok_or_else(|| inconsistent(format!("item {:?} is not in the list", id)))
}

/// Identity at `index`
pub fn at<T: Clone>(list: &[T], index: usize) -> Result<T> {
    list.get(index)
        .cloned()
        .ok_or_else(|| inconsistent(format!("no item at index {} of {}", index, list.len())))
}

pub fn remove_at<T>(list: &mut Vec<T>, index: usize) -> Result<T> {
    if index >= list.len() {
        return Err(inconsistent(format!(
            "cannot remove index {} of {}",
            index,
            list.len()
        )));
    }
    Ok(list.remove(index))
}

pub fn insert_at<T>(list: &mut Vec<T>, index: usize, id: T) -> Result<()> {
    if index > list.len() {
        return Err(inconsistent(format!(
            "cannot insert at index {} of {}",
            index,
            list.len()
        )));
    }
    list.insert(index, id);
    Ok(())
}

pub fn swap<T>(list: &mut [T], a: usize, b: usize) -> Result<()> {
    if a >= list.len() || b >= list.len() {
        return Err(inconsistent(format!(
            "cannot swap {} and {} of {}",
            a,
            b,
            list.len()
        )));
    }
    list.swap(a, b);
    Ok(())
}
