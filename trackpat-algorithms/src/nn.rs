//! Nearest-neighbour clustering over layered items.
//!
//! Items are swept in order of their layer key and only pairs whose keys
//! differ by at most one are offered to the predicate. Connected components
//! are tracked with union-find.

/// Symmetric merge condition between two items.
pub trait MergePredicate<T: ?Sized> {
    /// Whether `a` and `b` belong to the same cluster.
    fn mergeable(&self, a: &T, b: &T) -> bool;
}

impl<T: ?Sized, F: Fn(&T, &T) -> bool> MergePredicate<T> for F {
    fn mergeable(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}

/// Union-Find data structure for connected component detection.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return;
        }

        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] += 1;
            }
        }
    }
}

/// Nearest-neighbour clusterer restricted to adjacent layers.
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighborClustering {
    min_cluster_size: usize,
}

impl NearestNeighborClustering {
    /// Creates a clusterer dropping components smaller than `min_cluster_size`.
    #[must_use]
    pub fn new(min_cluster_size: usize) -> Self {
        Self { min_cluster_size }
    }

    /// Minimum size of returned clusters.
    #[must_use]
    pub fn min_cluster_size(&self) -> usize {
        self.min_cluster_size
    }

    /// Partitions `items` into connected components under `predicate`.
    ///
    /// Returns clusters as indices into `items`, each sorted ascending, the
    /// clusters ordered by their smallest index. Items of dropped components
    /// do not appear.
    pub fn cluster<T, K, P>(&self, items: &[T], key: K, predicate: &P) -> Vec<Vec<usize>>
    where
        K: Fn(&T) -> i64,
        P: MergePredicate<T> + ?Sized,
    {
        let n = items.len();
        if n == 0 {
            return Vec::new();
        }

        let keys: Vec<i64> = items.iter().map(&key).collect();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| (keys[i], i));

        let mut uf = UnionFind::new(n);
        for (pos, &i) in order.iter().enumerate() {
            for &j in &order[pos + 1..] {
                if keys[j] - keys[i] > 1 {
                    break;
                }
                if uf.find(i) == uf.find(j) {
                    continue;
                }
                if predicate.mergeable(&items[i], &items[j]) {
                    uf.union(i, j);
                }
            }
        }

        let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = uf.find(i);
            let slot = *slot_of_root[root].get_or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(i);
        }

        clusters.retain(|c| c.len() >= self.min_cluster_size);
        clusters
    }
}
