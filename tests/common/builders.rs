//! Test data builders

use graphs_core::{Item, StyleParams};

/// Builder for dataset items
pub struct DataItemBuilder {
    name: String,
    xdata: Vec<f64>,
    ydata: Vec<f64>,
    xlabel: String,
    ylabel: String,
    xposition: u8,
    selected: bool,
}

impl DataItemBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            xdata: vec![0.0, 1.0],
            ydata: vec![0.0, 1.0],
            xlabel: String::new(),
            ylabel: String::new(),
            xposition: 0,
            selected: true,
        }
    }

    pub fn data(mut self, xdata: &[f64], ydata: &[f64]) -> Self {
        self.xdata = xdata.to_vec();
        self.ydata = ydata.to_vec();
        self
    }

    pub fn labels(mut self, xlabel: &str, ylabel: &str) -> Self {
        self.xlabel = xlabel.to_string();
        self.ylabel = ylabel.to_string();
        self
    }

    pub fn xposition(mut self, xposition: u8) -> Self {
        self.xposition = xposition;
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn build(self) -> Item {
        let mut item = Item::data(&self.name, self.xdata, self.ydata, &StyleParams::default())
            .with_labels(&self.xlabel, &self.ylabel);
        item.xposition = self.xposition;
        item.selected = self.selected;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_item_builder() {
        let item = DataItemBuilder::new("test")
            .data(&[1.0, 2.0], &[3.0, 4.0])
            .xposition(1)
            .build();

        assert_eq!(item.name, "test");
        assert_eq!(item.xdata().unwrap(), &[1.0, 2.0]);
        assert_eq!(item.xposition, 1);
    }
}
