//! Tombstone-based deletion with optional neighbor-patching.
//!
//! Deletion never compacts node IDs in place (the O(1) addressing formula
//! depends on them staying dense and monotonic for *insertion*, but once a
//! node is marked deleted its slot is simply skipped by search and future
//! backward-link pruning). `needs_compaction()` reports when the deleted
//! fraction crosses the point where a full rebuild (reassigning IDs and
//! dropping tombstoned slots) would pay for itself.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::node::{NodeId, NodeRecord};
use anyhow::Result;

/// Strategy applied when a node is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// Mark the node deleted and leave its incoming links dangling. Search
    /// filters tombstoned nodes out of results, but traversal still walks
    /// through them, so graph navigability degrades as more nodes pile up.
    None,
    /// Mark the node deleted and reconnect its former neighbors to each
    /// other at every layer, preserving the graph's connectivity.
    NeighborsOnly,
}

/// Deleted-fraction threshold past which id-compaction is worth running.
const COMPACTION_THRESHOLD: f32 = 1.0 / 3.0;

impl HnswGraph {
    /// Returns whether a node is marked as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if `node_id` has never been written.
    pub fn is_deleted(&self, node_id: NodeId) -> Result<bool> {
        let record = self.read_node_record(node_id)?;
        Ok(record.header.is_deleted())
    }

    /// Fraction of live nodes (`0..node_count`) currently marked deleted.
    pub fn deleted_fraction(&self) -> Result<f32> {
        if self.node_count == 0 {
            return Ok(0.0);
        }

        let mut deleted = 0u64;
        for id in 0..self.node_count {
            if self.is_deleted(id)? {
                deleted += 1;
            }
        }

        Ok(deleted as f32 / self.node_count as f32)
    }

    /// Whether the deleted fraction has crossed the compaction threshold.
    ///
    /// This only reports the condition; id-compaction itself (reassigning
    /// dense IDs and rebuilding the graph without tombstoned nodes) is left
    /// to the caller, since it requires rewriting every reference to every
    /// moved ID and is a whole-index operation rather than a per-node one.
    pub fn needs_compaction(&self) -> Result<bool> {
        Ok(self.deleted_fraction()? > COMPACTION_THRESHOLD)
    }

    /// Mark a node deleted using the given patch strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if `node_id` does not exist.
    pub fn delete(&mut self, node_id: NodeId, strategy: DeleteStrategy) -> Result<()> {
        if node_id >= self.node_count {
            anyhow::bail!(
                "Cannot delete non-existent node: {} (node_count = {})",
                node_id,
                self.node_count
            );
        }

        let mut record = self.read_node_record(node_id)?;

        if strategy == DeleteStrategy::NeighborsOnly {
            self.reconnect_neighbors(&record)?;
        }

        record.header.set_deleted();
        self.update_node_record(&record)?;

        Ok(())
    }

    /// Cross-link a deleted node's surviving neighbors to each other at
    /// every layer it participated in, so removing it doesn't strand them.
    fn reconnect_neighbors(&mut self, record: &NodeRecord) -> Result<()> {
        for layer in 0..record.header.layer_count as usize {
            let neighbors = record.get_neighbors(layer);

            for &a in &neighbors {
                if self.is_deleted(a)? {
                    continue;
                }
                for &b in &neighbors {
                    if a == b || self.is_deleted(b)? {
                        continue;
                    }
                    self.add_backward_link_with_pruning(a, b, layer)?;
                }
            }
        }

        Ok(())
    }
}
