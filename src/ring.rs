/// Maps keys to node indices.
///
/// The proxy only ever talks to this trait, so a rebalancing-friendly scheme can replace [`Ring`]
/// without touching the routing code.
pub trait Partitioner: Send + Sync {
    /// Index of the node owning `key`, in `0..len()`.
    fn get(&self, key: &[u8]) -> usize;

    /// The node after `index`, wrapping around.
    fn next(&self, index: usize) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Static partition of the 32-bit CRC space into `nodes` equal slices.
///
/// Adding or removing a node reshuffles most keys; the node set is fixed when the ring is built.
#[derive(Debug, Clone, Copy)]
pub struct Ring {
    nodes: usize,
    step: u32,
}

impl Ring {
    /// Builds a ring over `nodes` slots. A ring needs at least one slot; zero is treated as one.
    pub fn new(nodes: usize) -> Ring {
        let nodes = nodes.max(1);
        let step = (u32::MAX / u32::try_from(nodes).unwrap_or(u32::MAX)).max(1);

        Ring { nodes, step }
    }
}

impl Partitioner for Ring {
    fn get(&self, key: &[u8]) -> usize {
        let slot = (crc32fast::hash(key) / self.step) as usize;
        slot.min(self.nodes - 1)
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.nodes
    }

    fn len(&self) -> usize {
        self.nodes
    }
}
