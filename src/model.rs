//! The mutable project state: items plus figure settings

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{GraphsError, Result};
use crate::figure::{Direction, FigureSettings};
use crate::item::Item;

/// Items and figure settings of one project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectModel {
    pub items: Vec<Item>,
    pub figure: FigureSettings,
}

impl ProjectModel {
    pub fn new(figure: FigureSettings) -> Self {
        Self {
            items: Vec::new(),
            figure,
        }
    }

    pub fn index_of(&self, uuid: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.uuid == uuid)
    }

    pub fn item(&self, uuid: Uuid) -> Result<&Item> {
        self.items
            .iter()
            .find(|item| item.uuid == uuid)
            .ok_or(GraphsError::UnknownItem(uuid))
    }

    pub fn item_mut(&mut self, uuid: Uuid) -> Result<&mut Item> {
        self.items
            .iter_mut()
            .find(|item| item.uuid == uuid)
            .ok_or(GraphsError::UnknownItem(uuid))
    }

    pub fn names(&self) -> HashSet<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }

    /// Whether `item` takes part in autoscaling and highlight operations
    pub fn is_visible(&self, item: &Item) -> bool {
        item.selected || !self.figure.hide_unselected
    }

    /// Axes an item is drawn against
    pub fn item_axes(item: &Item) -> (Direction, Direction) {
        (
            Direction::from_xposition(item.xposition),
            Direction::from_yposition(item.yposition),
        )
    }
}
