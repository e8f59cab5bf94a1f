//! Depression resolution by priority-flood with breaching
//!
//! A single priority-flood pass (Barnes et al. 2014) visits cells from the
//! grid edge inwards in elevation order. Each newly discovered cell is one
//! of three kinds:
//!
//! - **above** the popped cell: queued unchanged, it drains to the cell that
//!   discovered it;
//! - **flat** with the popped cell: raised by `epsilon` and processed next,
//!   which imposes a gradient towards the outlet across flats;
//! - **below** the frontier level: it lies in a depression. Fill mode raises
//!   it to the frontier; breach mode (Lindsay 2016) searches a bounded
//!   window for the least-cost path to an already-drained cell lower than
//!   it and carves the cells in between to a strictly descending profile.
//!
//! Seeds are edge cells and cells bordering nodata. Seeds that form an
//! 8-connected run of equal elevation contribute only their first cell in
//! row-major order, so a flat edge drains to a single outlet instead of
//! every edge cell becoming one. Ties in the queue are broken by insertion
//! order, which makes the output deterministic.
//!
//! References:
//! Barnes, R., Lehman, C., Mulla, D. (2014). Priority-Flood: An optimal
//! depression-filling and watershed-labeling algorithm for digital elevation
//! models. *Computers & Geosciences*, 62, 117–127.
//! Lindsay, J.B. (2016). Efficient hybrid breaching-filling sink removal
//! methods for flow path enforcement in digital elevation models.
//! *Hydrological Processes*, 30(6), 846–857.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use rillmap_core::raster::{d8, Raster};
use rillmap_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Depression handling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Carve a descending path out of each depression
    #[default]
    Breach,
    /// Raise each depression to its spill level
    Fill,
}

/// What to do with a depression cell that has no breach path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Raise that cell to the spill level
    #[default]
    Fill,
    /// Keep it as an explicit unresolved sink
    LeaveSink,
    /// Abort with `Error::Resolution`
    Fail,
}

/// Parameters for [`resolve_depressions`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveParams {
    pub mode: ResolveMode,
    /// Elevation increment imposed across flats and filled cells
    pub epsilon: f64,
    /// Breach search window radius (cells, Chebyshev distance)
    pub search_radius: usize,
    /// Maximum depth a single breach may carve below the depression cell
    pub max_depth: Option<f64>,
    pub fallback: FallbackPolicy,
    /// Queue pop budget; defaults to 32 pops per cell
    pub max_iterations: Option<usize>,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            mode: ResolveMode::Breach,
            epsilon: 1e-5,
            search_radius: 64,
            max_depth: None,
            fallback: FallbackPolicy::Fill,
            max_iterations: None,
        }
    }
}

/// Counters describing what the resolver did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub seeds: usize,
    /// Depression cells drained by a carved path
    pub breached: usize,
    /// Cells lowered while carving breach paths
    pub carved_cells: usize,
    /// Depression cells raised in fill mode
    pub filled: usize,
    /// Flat cells raised by epsilon
    pub flats_raised: usize,
    /// Breach failures resolved by filling the cell
    pub fallbacks: usize,
    /// Breach failures left as sinks
    pub unresolved: usize,
    pub iterations: usize,
}

/// Resolver output
#[derive(Debug, Clone)]
pub struct ResolvedDem {
    /// Hydrologically conditioned elevations (same nodata as the input)
    pub dem: Raster<f64>,
    /// 1 where the input cell lay below its spill level, else 0
    pub depressions: Raster<u8>,
    /// 1 where a depression cell was kept as a sink under
    /// [`FallbackPolicy::LeaveSink`]
    pub unresolved: Raster<u8>,
    pub stats: ResolutionStats,
}

impl ResolvedDem {
    /// (row, col) of every unresolved sink, row-major
    pub fn unresolved_cells(&self) -> Vec<(usize, usize)> {
        self.unresolved
            .data()
            .indexed_iter()
            .filter(|(_, v)| **v == 1)
            .map(|((r, c), _)| (r, c))
            .collect()
    }
}

/// Depression resolver
#[derive(Debug, Clone, Default)]
pub struct DepressionResolver;

impl Algorithm for DepressionResolver {
    type Input = Raster<f64>;
    type Output = ResolvedDem;
    type Params = ResolveParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Resolve depressions"
    }

    fn description(&self) -> &'static str {
        "Remove spurious sinks by priority-flood breaching with fill fallback"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        resolve_depressions(&input, &params)
    }
}

/// Queue entry ordered by elevation, then insertion sequence (min-heap).
#[derive(Debug, Clone, Copy)]
struct Node {
    key: f64,
    seq: u64,
    idx: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Queued,
    Done,
    NoData,
}

struct Flood<'a> {
    params: &'a ResolveParams,
    rows: usize,
    cols: usize,
    elev: Vec<f64>,
    /// Elevation before epsilon nudges; the frontier level of a popped cell
    level: Vec<f64>,
    state: Vec<State>,
    depression: Vec<u8>,
    heap: BinaryHeap<Node>,
    pit: VecDeque<usize>,
    seq: u64,
    stats: ResolutionStats,
    unresolved: Vec<u8>,
}

impl<'a> Flood<'a> {
    fn new(dem: &Raster<f64>, params: &'a ResolveParams) -> Self {
        let (rows, cols) = dem.shape();
        let elev: Vec<f64> = dem.data().iter().copied().collect();
        let state = elev
            .iter()
            .map(|&z| if dem.is_nodata(z) { State::NoData } else { State::Open })
            .collect();
        Self {
            params,
            rows,
            cols,
            level: elev.clone(),
            elev,
            state,
            depression: vec![0; rows * cols],
            heap: BinaryHeap::new(),
            pit: VecDeque::new(),
            seq: 0,
            stats: ResolutionStats::default(),
            unresolved: vec![0; rows * cols],
        }
    }

    #[inline]
    fn rc(&self, idx: usize) -> (usize, usize) {
        (idx / self.cols, idx % self.cols)
    }

    fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let (row, col) = self.rc(idx);
        d8::CODES
            .iter()
            .filter_map(move |&code| d8::neighbor(row, col, code, self.rows, self.cols))
            .map(move |(r, c)| r * self.cols + c)
    }

    fn push(&mut self, idx: usize) {
        self.seq += 1;
        self.heap.push(Node {
            key: self.elev[idx],
            seq: self.seq,
            idx,
        });
    }

    fn is_seed_candidate(&self, idx: usize) -> bool {
        if self.state[idx] == State::NoData {
            return false;
        }
        let (row, col) = self.rc(idx);
        if row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.cols {
            return true;
        }
        self.neighbors(idx).any(|n| self.state[n] == State::NoData)
    }

    /// Queue the first cell of every equal-elevation run of edge cells.
    fn seed(&mut self) {
        let n = self.rows * self.cols;
        let candidate: Vec<bool> = (0..n).map(|i| self.is_seed_candidate(i)).collect();
        let mut grouped = vec![false; n];
        let mut stack = Vec::new();

        for start in 0..n {
            if !candidate[start] || grouped[start] {
                continue;
            }
            let z = self.elev[start];
            grouped[start] = true;
            stack.push(start);
            while let Some(i) = stack.pop() {
                let run: Vec<usize> = self
                    .neighbors(i)
                    .filter(|&m| candidate[m] && !grouped[m] && self.elev[m] == z)
                    .collect();
                for m in run {
                    grouped[m] = true;
                    stack.push(m);
                }
            }
            self.state[start] = State::Queued;
            self.push(start);
            self.stats.seeds += 1;
        }
    }

    fn run(&mut self) -> Result<()> {
        let n = self.rows * self.cols;
        let budget = self
            .params
            .max_iterations
            .unwrap_or_else(|| n.saturating_mul(32).saturating_add(1024));

        loop {
            let cell = if let Some(idx) = self.pit.pop_front() {
                idx
            } else if let Some(node) = self.heap.pop() {
                if node.key != self.elev[node.idx] {
                    continue;
                }
                node.idx
            } else {
                break;
            };

            self.stats.iterations += 1;
            if self.stats.iterations > budget {
                return Err(Error::Resolution(format!(
                    "priority-flood exceeded its budget of {} iterations",
                    budget
                )));
            }

            if self.state[cell] == State::Done {
                continue;
            }
            self.state[cell] = State::Done;
            self.expand(cell)?;
        }

        if let Some(open) = self.state.iter().position(|s| *s == State::Open) {
            let (row, col) = self.rc(open);
            return Err(Error::Resolution(format!(
                "cell ({}, {}) was never reached by the flood",
                row, col
            )));
        }
        Ok(())
    }

    fn expand(&mut self, cell: usize) -> Result<()> {
        let eps = self.params.epsilon;
        let open: Vec<usize> = self
            .neighbors(cell)
            .filter(|&m| self.state[m] == State::Open)
            .collect();

        for nb in open {
            // A breach from an earlier neighbor may have queued this one
            if self.state[nb] != State::Open {
                continue;
            }
            let z = self.elev[nb];
            if z < self.level[cell] {
                self.depression[nb] = 1;
                match self.params.mode {
                    ResolveMode::Fill => {
                        self.raise(nb, cell);
                        self.stats.filled += 1;
                    }
                    ResolveMode::Breach => self.breach_or_fallback(nb, cell)?,
                }
            } else if z < self.elev[cell] + eps {
                self.elev[nb] = self.elev[cell] + eps;
                self.state[nb] = State::Queued;
                self.pit.push_back(nb);
                self.stats.flats_raised += 1;
            } else {
                self.state[nb] = State::Queued;
                self.push(nb);
            }
        }
        Ok(())
    }

    fn raise(&mut self, nb: usize, cell: usize) {
        self.level[nb] = self.level[cell];
        self.elev[nb] = self.elev[cell] + self.params.epsilon;
        self.state[nb] = State::Queued;
        self.pit.push_back(nb);
    }

    fn breach_or_fallback(&mut self, nb: usize, cell: usize) -> Result<()> {
        if let Some(path) = self.breach_path(nb) {
            self.carve(nb, &path);
            self.state[nb] = State::Queued;
            self.pit.push_back(nb);
            self.stats.breached += 1;
            return Ok(());
        }

        let (row, col) = self.rc(nb);
        match self.params.fallback {
            FallbackPolicy::Fill => {
                self.raise(nb, cell);
                self.stats.fallbacks += 1;
            }
            FallbackPolicy::LeaveSink => {
                self.state[nb] = State::Queued;
                self.pit.push_back(nb);
                self.unresolved[nb] = 1;
                self.stats.unresolved += 1;
            }
            FallbackPolicy::Fail => {
                return Err(Error::Resolution(format!(
                    "no breach path within {} cells of depression cell ({}, {})",
                    self.params.search_radius, row, col
                )));
            }
        }
        Ok(())
    }

    /// Least-cost path from `source` to a drained cell lower than it.
    ///
    /// Returns the intermediate cells followed by the target, or `None` when
    /// no target lies within the search window or the carve limit.
    fn breach_path(&self, source: usize) -> Option<Vec<usize>> {
        let z0 = self.elev[source];
        let (sr, sc) = self.rc(source);
        let radius = self.params.search_radius;
        let max_depth = self.params.max_depth.unwrap_or(f64::INFINITY);

        let mut best: HashMap<usize, (f64, usize)> = HashMap::new();
        let mut settled: HashSet<usize> = HashSet::new();
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;
        best.insert(source, (0.0, usize::MAX));
        heap.push(Node {
            key: 0.0,
            seq,
            idx: source,
        });

        while let Some(Node { key: cost, idx, .. }) = heap.pop() {
            if !settled.insert(idx) {
                continue;
            }

            if idx != source
                && matches!(self.state[idx], State::Done | State::Queued)
                && self.elev[idx] < z0
            {
                let mut path = vec![idx];
                let mut trace = best[&idx].1;
                while trace != source {
                    path.push(trace);
                    trace = best[&trace].1;
                }
                path.reverse();
                return Some(path);
            }

            let (row, col) = self.rc(idx);
            if row.abs_diff(sr).max(col.abs_diff(sc)) >= radius {
                continue;
            }

            for &code in &d8::CODES {
                let Some((nr, nc)) = d8::neighbor(row, col, code, self.rows, self.cols) else {
                    continue;
                };
                let m = nr * self.cols + nc;
                if m == source || self.state[m] == State::NoData || settled.contains(&m) {
                    continue;
                }
                let carve = (self.elev[m] - z0).max(0.0);
                if carve > max_depth {
                    continue;
                }
                let step = if code % 2 == 0 { std::f64::consts::SQRT_2 } else { 1.0 };
                let next = cost + carve * step;
                if best.get(&m).is_none_or(|&(c, _)| next < c) {
                    best.insert(m, (next, idx));
                    seq += 1;
                    heap.push(Node {
                        key: next,
                        seq,
                        idx: m,
                    });
                }
            }
        }
        None
    }

    /// Lower the intermediate cells of `path` onto a linear profile between
    /// the source and the target elevation. Cells are never raised.
    fn carve(&mut self, source: usize, path: &[usize]) {
        let Some((&target, between)) = path.split_last() else {
            return;
        };
        let z0 = self.elev[source];
        let zt = self.elev[target];
        let steps = between.len() + 1;

        for (i, &p) in between.iter().enumerate() {
            let profile = z0 - (z0 - zt) * (i + 1) as f64 / steps as f64;
            if self.elev[p] <= profile {
                continue;
            }
            self.elev[p] = profile;
            self.level[p] = profile;
            self.stats.carved_cells += 1;
            match self.state[p] {
                State::Open | State::Queued => {
                    self.state[p] = State::Queued;
                    self.push(p);
                }
                State::Done | State::NoData => {}
            }
        }
    }
}

/// Resolve depressions so every valid cell drains to the grid edge, to a
/// nodata region, or to an explicitly reported unresolved sink.
///
/// # Errors
/// `Error::Resolution` when the iteration budget is exhausted or a breach
/// fails under [`FallbackPolicy::Fail`].
pub fn resolve_depressions(dem: &Raster<f64>, params: &ResolveParams) -> Result<ResolvedDem> {
    if !(params.epsilon.is_finite() && params.epsilon > 0.0) {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: params.epsilon.to_string(),
            reason: "must be a positive finite increment".into(),
        });
    }

    let mut flood = Flood::new(dem, params);
    flood.seed();
    flood.run()?;

    let stats = flood.stats;
    if stats.fallbacks > 0 {
        warn!(
            fallbacks = stats.fallbacks,
            radius = params.search_radius,
            "depression cells without a breach path were filled"
        );
    }
    if stats.unresolved > 0 {
        warn!(cells = stats.unresolved, "depression cells left as unresolved sinks");
    }
    debug!(?stats, "resolved depressions");

    let out = dem.with_vec(flood.elev, dem.nodata())?;
    let depressions = dem.with_vec(flood.depression, None)?;
    let unresolved = dem.with_vec(flood.unresolved, None)?;

    Ok(ResolvedDem {
        dem: out,
        depressions,
        unresolved,
        stats,
    })
}
