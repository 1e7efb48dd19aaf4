use std::collections::HashMap;

/// Union-find over `0..n` with path halving and union by size
#[derive(Debug, Clone, Default)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let mut a = self.find(a);
        let mut b = self.find(b);
        if a == b {
            return false;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
        true
    }

    /// Partition `0..n` into components. Components are ordered by their smallest
    /// member and members are listed in ascending order, so the result depends only
    /// on which elements are connected.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut root_to_component: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            let k = *root_to_component.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[k].push(i);
        }
        components
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_components() {
        let mut ds = DisjointSet::new(6);
        ds.union(4, 1);
        ds.union(5, 2);
        ds.union(2, 4);
        assert!(!ds.union(1, 5));
        let components = ds.components();
        assert_eq!(components, vec![vec![0], vec![1, 2, 4, 5], vec![3]]);
    }
}
