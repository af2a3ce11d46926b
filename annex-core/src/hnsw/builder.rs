use crate::hnsw::graph::HnswGraph;
use crate::hnsw::node::NodeId;
use crate::hnsw::HnswParams;
use crate::Storage;
use anyhow::Result;
use parking_lot::Mutex;

/// Builder for constructing an HNSW index from a batch of already-stored vectors.
///
/// Performs real greedy-descent-then-ef-bounded-search construction: for each
/// node, it descends from the current entry point down to its own layer, then
/// gathers `ef_construction` candidates at each layer from there down to 0 and
/// picks diverse neighbors via `HnswGraph::select_neighbors_heuristic`.
#[derive(Debug, Clone, Copy)]
pub struct HnswBuilder {
    params: HnswParams,
}

/// The read-only outcome of searching the graph for where `node_id` belongs,
/// computed against the graph state as of the start of its batch. Applying
/// it (`commit_insertion`) is the only part of insertion that mutates the
/// graph, which is what lets `build()` compute plans for a whole batch of
/// nodes concurrently while keeping the dense node-id invariant intact.
pub(crate) struct InsertionPlan {
    layer: usize,
    neighbors_per_layer: Vec<Vec<NodeId>>,
}

impl HnswBuilder {
    pub fn new(params: HnswParams) -> Self {
        Self { params }
    }

    /// Build index from existing storage.
    ///
    /// Vectors must already be present in `storage` (ids `0..storage.count()`);
    /// this only constructs the graph on top of them.
    ///
    /// Nodes are inserted in batches of `index_thread_qty` (`0` meaning "use
    /// all available cores"): within a batch, every node's insertion plan
    /// (greedy descent + `ef_construction` search + neighbor selection) is
    /// computed concurrently via [`crate::worker::parallel_for`] against the
    /// graph as it stood at the start of the batch, then the plans are
    /// committed to the graph serially in node-id order. This keeps the
    /// dense, monotonically-increasing node-id invariant `write_node_and_backlinks`
    /// enforces while still parallelizing the expensive search phase; the
    /// tradeoff is that neighbor candidates within a batch may be slightly
    /// stale relative to other nodes committed earlier in the same batch,
    /// same as any batch-parallel HNSW construction.
    pub fn build(self, storage: Storage) -> Result<HnswGraph> {
        let mut graph = HnswGraph::open(storage, self.params)?;
        let count = graph.storage.count();

        if count == 0 {
            return Ok(graph);
        }

        // Seed the entry point serially: every later plan's greedy descent
        // needs at least one published node to descend from.
        self.insert(&mut graph, 0)?;

        let mut next = 1;
        let batch_size = if self.params.index_thread_qty == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.params.index_thread_qty
        };

        while next < count {
            let batch_end = (next + batch_size as u64).min(count);
            let batch_start = next;

            let plans: Vec<Mutex<Option<Result<InsertionPlan>>>> =
                (batch_start..batch_end).map(|_| Mutex::new(None)).collect();

            crate::worker::parallel_for(
                batch_start as usize,
                batch_end as usize,
                self.params.index_thread_qty,
                |node_id, _thread_id| {
                    let plan = self.plan_insertion(&graph, node_id as NodeId);
                    *plans[node_id - batch_start as usize].lock() = Some(plan);
                },
            );

            for (offset, slot) in plans.into_iter().enumerate() {
                let node_id = batch_start + offset as u64;
                let plan = slot.into_inner().expect("every batch slot is filled by parallel_for")?;
                self.commit_insertion(&mut graph, node_id, plan)?;
            }

            next = batch_end;
        }

        Ok(graph)
    }

    /// Link a single already-stored node into `graph` using the standard
    /// HNSW insertion procedure: greedy descent to find a local entry point,
    /// then `ef_construction`-bounded search and heuristic neighbor selection
    /// at every layer at or below the node's own drawn level.
    ///
    /// `node_id` must already have its vector present in `graph`'s storage
    /// and must equal `graph.node_count()` (the dense-id invariant). Used
    /// directly by online single-vector inserts (`VectorIndex::add`); `build`
    /// instead splits this into `plan_insertion`/`commit_insertion` so the
    /// search phase can run off the calling thread.
    pub(crate) fn insert(&self, graph: &mut HnswGraph, node_id: NodeId) -> Result<()> {
        let plan = self.plan_insertion(graph, node_id)?;
        self.commit_insertion(graph, node_id, plan)
    }

    /// Read-only search phase of insertion: finds where `node_id` belongs in
    /// the graph as it currently stands, without mutating it.
    fn plan_insertion(&self, graph: &HnswGraph, node_id: NodeId) -> Result<InsertionPlan> {
        let layer = self.select_layer();
        let m = self.params.max_connections as usize;
        let m0 = m * 2;

        let mut neighbors_per_layer = vec![Vec::new(); layer + 1];

        if let Some(entry_point) = graph.entry_point {
            let query = graph.storage.get_vector(node_id)?;

            // Greedy descent from the top of the graph down to layer + 1,
            // tracking the single nearest node found at each level as the
            // entry point for the level below.
            let mut current = entry_point;
            let mut current_layer = graph.max_layer;

            while current_layer > layer {
                if let Some(nearest) =
                    graph.search_layer_optimized(&query, current, 1, current_layer)?.into_iter().next()
                {
                    current = nearest.id;
                }
                if current_layer == 0 {
                    break;
                }
                current_layer -= 1;
            }

            // ef_construction-bounded search at every layer from min(layer,
            // graph.max_layer) down to 0, selecting diverse neighbors at each.
            let start_layer = layer.min(graph.max_layer);

            for lc in (0..=start_layer).rev() {
                let candidates =
                    graph.search_layer_optimized(&query, current, self.params.ef_construction, lc)?;

                if let Some(nearest) = candidates.first() {
                    current = nearest.id;
                }

                let candidate_ids: Vec<NodeId> = candidates.iter().map(|r| r.id).collect();
                let max_count = if lc == 0 { m0 } else { m };

                let selected = graph.select_neighbors_heuristic(
                    node_id,
                    &candidate_ids,
                    lc,
                    max_count,
                    None,
                    self.params.delaunay_type,
                )?;

                neighbors_per_layer[lc] = selected;
            }
        }

        Ok(InsertionPlan { layer, neighbors_per_layer })
    }

    /// Write phase of insertion: commits a previously-computed plan to the
    /// graph. Must be called with `node_id == graph.node_count()`.
    fn commit_insertion(&self, graph: &mut HnswGraph, node_id: NodeId, plan: InsertionPlan) -> Result<()> {
        graph.write_node_and_backlinks(node_id, plan.layer + 1, &plan.neighbors_per_layer)?;
        graph.publish_node(node_id, plan.layer + 1)?;
        Ok(())
    }

    /// Select layer for new node using exponential decay.
    ///
    /// Draws `uniform` from `(0, 1]` rather than `[0, 1)` so `ln(uniform)`
    /// never hits `-inf` (which would otherwise happen whenever the RNG
    /// produced exactly `0.0`, corrupting the layer count).
    pub(crate) fn select_layer(&self) -> usize {
        let uniform: f32 = 1.0 - rand::random::<f32>();
        (-uniform.ln() * self.params.ml).floor() as usize
    }
}
