use burn::data::dataset::Dataset;

use crate::domain::features::GraphFeatures;

/// Featurized molecules viewed as a Burn dataset, in input order.
pub struct GraphDataset<'a> {
    samples: &'a [GraphFeatures],
}

impl<'a> GraphDataset<'a> {
    pub fn new(samples: &'a [GraphFeatures]) -> Self { Self { samples } }

    /// Items `[start, end)`, clamped to the dataset length.
    pub fn window(&self, start: usize, end: usize) -> Vec<GraphFeatures> {
        (start..end.min(self.len())).filter_map(|i| self.get(i)).collect()
    }
}

impl Dataset<GraphFeatures> for GraphDataset<'_> {
    fn get(&self, index: usize) -> Option<GraphFeatures> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
