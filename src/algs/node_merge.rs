//! Merge of the per-PE node sets into renumbering offsets and comm maps.
//!
//! A node shared by several PEs is numbered by the lowest rank that holds it.
//! Every other holder finds the node in its comm map, under the owner's rank,
//! and asks the owner for the new id.

use hashbrown::HashMap;
use std::collections::BTreeMap;

/// Result of [`merge_nodes`], indexed by PE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMerge {
    /// `comm[p][q]`: old ids of PE `p` numbered by PE `q`.
    pub comm: Vec<BTreeMap<usize, Vec<u64>>>,
    /// Number of nodes each PE numbers.
    pub owned: Vec<u64>,
    /// First new id of each PE.
    pub start: Vec<u64>,
    /// Number of distinct nodes in the mesh.
    pub total: u64,
}

/// `ids[p]` is the sorted, deduplicated old-id set of PE `p`.
pub fn merge_nodes(ids: &[Vec<u64>]) -> NodeMerge {
    let npes = ids.len();
    let mut owner: HashMap<u64, usize> = HashMap::new();
    let mut comm = vec![BTreeMap::new(); npes];
    let mut owned = vec![0u64; npes];

    for (p, set) in ids.iter().enumerate() {
        debug_assert!(set.windows(2).all(|w| w[0] < w[1]), "PE {p} node set not sorted and unique");
        let mut shared = 0;
        for &x in set {
            let q = *owner.entry(x).or_insert(p);
            if q != p {
                comm[p].entry(q).or_insert_with(Vec::new).push(x);
                shared += 1;
            }
        }
        owned[p] = (set.len() - shared) as u64;
    }

    let mut start = Vec::with_capacity(npes);
    let mut total = 0;
    for &n in &owned {
        start.push(total);
        total += n;
    }

    NodeMerge {
        comm,
        owned,
        start,
        total,
    }
}
