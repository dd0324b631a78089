use crate::err::SolveError;
use crate::wrap::Wrap;
use coord_2d::{Coord, Size};
use direction::{CardinalDirection, CardinalDirectionTable, CardinalDirections};
use grid_2d::Grid;
use hashbrown::HashMap;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::iter;
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::ops::{Index, IndexMut};
use std::slice;

pub type PatternId = u32;

#[derive(Default, Clone, Debug)]
pub struct PatternTable<T> {
    table: Vec<T>,
}

impl<T> PatternTable<T> {
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn iter(&self) -> slice::Iter<T> {
        self.table.iter()
    }
    pub fn iter_mut(&mut self) -> slice::IterMut<T> {
        self.table.iter_mut()
    }
    pub fn enumerate(&self) -> impl Iterator<Item = (PatternId, &T)> {
        self.iter()
            .enumerate()
            .map(|(index, item)| (index as PatternId, item))
    }
}

impl<T: Clone> PatternTable<T> {
    fn resize(&mut self, size: usize, value: T) {
        self.table.resize(size, value);
    }
}

impl<T> iter::FromIterator<T> for PatternTable<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            table: Vec::from_iter(iter),
        }
    }
}

impl<T> Index<PatternId> for PatternTable<T> {
    type Output = T;
    fn index(&self, index: PatternId) -> &Self::Output {
        self.table.index(index as usize)
    }
}

impl<T> IndexMut<PatternId> for PatternTable<T> {
    fn index_mut(&mut self, index: PatternId) -> &mut Self::Output {
        self.table.index_mut(index as usize)
    }
}

pub struct PatternWeight {
    weight: NonZeroU32,
    weight_log_weight: f32,
}

impl PatternWeight {
    pub fn new(weight: NonZeroU32) -> Self {
        Self {
            weight,
            weight_log_weight: (weight.get() as f32) * (weight.get() as f32).log2(),
        }
    }
    pub fn weight(&self) -> u32 {
        self.weight.get()
    }
    pub fn weight_log_weight(&self) -> f32 {
        self.weight_log_weight
    }
}

/// Heuristic used to pick the next cell to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heuristic {
    /// Minimum positive Shannon entropy, noise breaking ties.
    #[default]
    Entropy,
    /// Fewest remaining patterns, noise breaking ties.
    Mrv,
    /// First undecided cell in row-major order, resuming from the
    /// previous observation.
    Scanline,
}

/// Read-only solver inputs: the pattern weights and the per-direction
/// compatibility lists. Built once and shared by reference across runs.
pub struct GlobalStats {
    pattern_weights: PatternTable<PatternWeight>,
    compatibility: PatternTable<CardinalDirectionTable<Vec<PatternId>>>,
    sum_weight: u32,
    sum_weight_log_weight: f32,
}

impl GlobalStats {
    pub fn new(
        pattern_weights: PatternTable<PatternWeight>,
        compatibility: PatternTable<CardinalDirectionTable<Vec<PatternId>>>,
    ) -> Self {
        assert_eq!(pattern_weights.len(), compatibility.len());
        let sum_weight = pattern_weights.iter().map(|w| w.weight()).sum();
        let sum_weight_log_weight =
            pattern_weights.iter().map(|w| w.weight_log_weight()).sum();
        Self {
            pattern_weights,
            compatibility,
            sum_weight,
            sum_weight_log_weight,
        }
    }
    pub fn num_patterns(&self) -> usize {
        self.pattern_weights.len()
    }
    pub fn weight(&self, pattern_id: PatternId) -> u32 {
        self.pattern_weights[pattern_id].weight()
    }
    fn pattern_weight(&self, pattern_id: PatternId) -> &PatternWeight {
        &self.pattern_weights[pattern_id]
    }
    pub fn compatible_patterns_in_direction(
        &self,
        pattern_id: PatternId,
        direction: CardinalDirection,
    ) -> impl Iterator<Item = &PatternId> {
        self.compatibility[pattern_id].get(direction).iter()
    }
    /// Initial support of each pattern: the number of patterns whose
    /// compatibility list in the opposite direction contains it.
    fn initial_support(&self) -> impl Iterator<Item = CardinalDirectionTable<u32>> + '_ {
        self.compatibility.iter().map(|by_direction| {
            let mut support = CardinalDirectionTable::default();
            for direction in CardinalDirections {
                *support.get_mut(direction) =
                    by_direction.get(direction.opposite()).len() as u32;
            }
            support
        })
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
struct EntropyWithNoise {
    entropy: f32,
    noise: u32,
    // Snapshot of the cell's pattern count when this entry was created.
    // A mismatch against the live count marks a stale heap entry without
    // re-computing the entropy.
    num_possible_patterns: u32,
}

impl Eq for EntropyWithNoise {}

impl PartialOrd for EntropyWithNoise {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.entropy.partial_cmp(&other.entropy) {
            Some(Ordering::Equal) => self.noise.partial_cmp(&other.noise),
            other_ordering => other_ordering,
        }
    }
}

const ZERO_SUPPORT: CardinalDirectionTable<u32> =
    CardinalDirectionTable::new_array([0, 0, 0, 0]);

#[derive(Default, Clone, Debug)]
struct PatternState {
    possible: bool,
    support: CardinalDirectionTable<u32>,
}

enum BanOutcome {
    AlreadyImpossible,
    PatternRemoved,
    CellFinalized,
    CellContradicted,
}

enum SupportChange {
    StillSupported,
    PatternAlreadyImpossible,
    PatternRemoved,
    CellFinalized,
    CellContradicted,
}

#[derive(Default, Clone, Debug)]
pub struct WaveCell {
    // random value to break entropy and pattern-count ties
    noise: u32,
    num_possible_patterns: u32,
    // w0 + w1 + w2 + ...
    sum_possible_weight: u32,
    // w0*log(w0) + w1*log(w1) + w2*log(w2) + ...
    sum_possible_weight_log_weight: f32,
    states: PatternTable<PatternState>,
}

impl WaveCell {
    pub fn num_possible_patterns(&self) -> u32 {
        self.num_possible_patterns
    }
    pub fn is_possible(&self, pattern_id: PatternId) -> bool {
        self.states[pattern_id].possible
    }
    pub fn possible_pattern_ids(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.states
            .enumerate()
            .filter(|(_, state)| state.possible)
            .map(|(pattern_id, _)| pattern_id)
    }
    pub fn first_possible_pattern_id(&self) -> Option<PatternId> {
        self.possible_pattern_ids().next()
    }
    fn init<R: Rng>(&mut self, global_stats: &GlobalStats, rng: &mut R) {
        self.noise = rng.gen();
        self.num_possible_patterns = global_stats.num_patterns() as u32;
        self.sum_possible_weight = global_stats.sum_weight;
        self.sum_possible_weight_log_weight = global_stats.sum_weight_log_weight;
        self.states
            .resize(global_stats.num_patterns(), PatternState::default());
        self.states
            .iter_mut()
            .zip(global_stats.initial_support())
            .for_each(|(state, support)| {
                *state = PatternState {
                    possible: true,
                    support,
                };
            });
    }
    fn ban(&mut self, pattern_id: PatternId, global_stats: &GlobalStats) -> BanOutcome {
        {
            let state = &mut self.states[pattern_id];
            if !state.possible {
                return BanOutcome::AlreadyImpossible;
            }
            state.possible = false;
            state.support = ZERO_SUPPORT;
        }
        assert!(self.num_possible_patterns >= 1);
        self.num_possible_patterns -= 1;
        let pattern_weight = global_stats.pattern_weight(pattern_id);
        assert!(self.sum_possible_weight >= pattern_weight.weight());
        self.sum_possible_weight -= pattern_weight.weight();
        self.sum_possible_weight_log_weight -= pattern_weight.weight_log_weight();
        match self.num_possible_patterns {
            0 => BanOutcome::CellContradicted,
            1 => BanOutcome::CellFinalized,
            _ => BanOutcome::PatternRemoved,
        }
    }
    fn decrement_support(
        &mut self,
        pattern_id: PatternId,
        direction: CardinalDirection,
        global_stats: &GlobalStats,
    ) -> SupportChange {
        {
            let state = &mut self.states[pattern_id];
            if !state.possible {
                return SupportChange::PatternAlreadyImpossible;
            }
            let count = state.support.get_mut(direction);
            assert!(*count > 0);
            *count -= 1;
            if *count > 0 {
                return SupportChange::StillSupported;
            }
        }
        match self.ban(pattern_id, global_stats) {
            BanOutcome::AlreadyImpossible => {
                unreachable!("pattern was possible before losing support")
            }
            BanOutcome::PatternRemoved => SupportChange::PatternRemoved,
            BanOutcome::CellFinalized => SupportChange::CellFinalized,
            BanOutcome::CellContradicted => SupportChange::CellContradicted,
        }
    }
    fn remove_all_patterns_except(
        &mut self,
        coord: Coord,
        pattern_id_to_keep: PatternId,
        global_stats: &GlobalStats,
        propagator: &mut Propagator,
    ) {
        assert!(self.states[pattern_id_to_keep].possible);
        for pattern_id in 0..self.states.len() as PatternId {
            if pattern_id == pattern_id_to_keep {
                continue;
            }
            match self.ban(pattern_id, global_stats) {
                BanOutcome::AlreadyImpossible => (),
                BanOutcome::CellContradicted => {
                    unreachable!("the kept pattern is still possible")
                }
                BanOutcome::PatternRemoved | BanOutcome::CellFinalized => propagator
                    .push(RemovedPattern {
                        coord,
                        pattern_id,
                    }),
            }
        }
    }
    fn choose_pattern_id<R: Rng>(
        &self,
        global_stats: &GlobalStats,
        rng: &mut R,
    ) -> PatternId {
        assert!(self.num_possible_patterns >= 1);
        assert!(self.sum_possible_weight >= 1);
        let mut remaining = rng.gen_range(0..self.sum_possible_weight);
        for pattern_id in self.possible_pattern_ids() {
            let weight = global_stats.weight(pattern_id);
            if remaining >= weight {
                remaining -= weight;
            } else {
                return pattern_id;
            }
        }
        unreachable!("the running sum of possible weights covers the draw");
    }
    fn entropy_with_noise(&self) -> EntropyWithNoise {
        assert!(self.sum_possible_weight > 0);
        // log(w0+w1+...) - (w0*log(w0) + w1*log(w1) + ...) / (w0+w1+...)
        let sum_possible_weight = self.sum_possible_weight as f32;
        let entropy = sum_possible_weight.log2()
            - (self.sum_possible_weight_log_weight / sum_possible_weight);
        EntropyWithNoise {
            entropy,
            noise: self.noise,
            num_possible_patterns: self.num_possible_patterns,
        }
    }
}

#[derive(Clone)]
pub struct Wave {
    grid: Grid<WaveCell>,
}

impl Wave {
    pub fn new(size: Size) -> Self {
        Self {
            grid: Grid::new_default(size),
        }
    }
    pub fn size(&self) -> Size {
        self.grid.size()
    }
    pub fn grid(&self) -> &Grid<WaveCell> {
        &self.grid
    }
    /// Resets every cell to full superposition, then drops patterns that
    /// already lack support from some direction in which a neighbouring
    /// cell exists, seeding the propagator with those removals.
    fn init<W: Wrap, R: Rng>(
        &mut self,
        global_stats: &GlobalStats,
        propagator: &mut Propagator,
        rng: &mut R,
    ) -> Result<(), Contradiction> {
        self.grid
            .iter_mut()
            .for_each(|cell| cell.init(global_stats, rng));
        let size = self.grid.size();
        for y in 0..size.height() as i32 {
            for x in 0..size.width() as i32 {
                let coord = Coord::new(x, y);
                let cell = self.grid.get_checked_mut(coord);
                for pattern_id in 0..global_stats.num_patterns() as PatternId {
                    let mut starved = false;
                    for direction in CardinalDirections {
                        let source = coord + direction.opposite().coord();
                        if *cell.states[pattern_id].support.get(direction) == 0
                            && W::normalize_coord(source, size).is_some()
                        {
                            starved = true;
                            break;
                        }
                    }
                    if starved {
                        match cell.ban(pattern_id, global_stats) {
                            BanOutcome::AlreadyImpossible => (),
                            BanOutcome::CellContradicted => return Err(Contradiction),
                            BanOutcome::PatternRemoved | BanOutcome::CellFinalized => {
                                propagator.push(RemovedPattern { coord, pattern_id })
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RemovedPattern {
    coord: Coord,
    pattern_id: PatternId,
}

#[derive(Default, Clone)]
struct Propagator {
    queue: VecDeque<RemovedPattern>,
}

struct Contradiction;

impl Propagator {
    fn clear(&mut self) {
        self.queue.clear();
    }
    fn push(&mut self, removed_pattern: RemovedPattern) {
        self.queue.push_back(removed_pattern);
    }
    fn propagate<W: Wrap>(
        &mut self,
        wave: &mut Wave,
        global_stats: &GlobalStats,
        entropy_changes_by_coord: &mut HashMap<Coord, EntropyWithNoise>,
        num_undecided_cells: &mut u32,
    ) -> Result<(), Contradiction> {
        entropy_changes_by_coord.clear();
        let wave_size = wave.grid.size();
        while let Some(removed_pattern) = self.queue.pop_front() {
            for direction in CardinalDirections {
                let coord_to_update = match W::normalize_coord(
                    removed_pattern.coord + direction.coord(),
                    wave_size,
                ) {
                    Some(coord_to_update) => coord_to_update,
                    None => continue,
                };
                let cell = wave.grid.get_checked_mut(coord_to_update);
                for &pattern_id in global_stats.compatible_patterns_in_direction(
                    removed_pattern.pattern_id,
                    direction,
                ) {
                    match cell.decrement_support(pattern_id, direction, global_stats) {
                        SupportChange::StillSupported
                        | SupportChange::PatternAlreadyImpossible => continue,
                        SupportChange::PatternRemoved => {
                            let entropy = cell.entropy_with_noise();
                            entropy_changes_by_coord
                                .entry(coord_to_update)
                                .and_modify(|existing_entropy| {
                                    if entropy < *existing_entropy {
                                        *existing_entropy = entropy;
                                    }
                                })
                                .or_insert(entropy);
                        }
                        SupportChange::CellFinalized => {
                            assert!(*num_undecided_cells >= 1);
                            *num_undecided_cells -= 1;
                            entropy_changes_by_coord.remove(&coord_to_update);
                        }
                        SupportChange::CellContradicted => {
                            return Err(Contradiction);
                        }
                    }
                    self.queue.push_back(RemovedPattern {
                        coord: coord_to_update,
                        pattern_id,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
struct CoordEntropy {
    coord: Coord,
    entropy_with_noise: EntropyWithNoise,
}

impl PartialOrd for CoordEntropy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // reversed: BinaryHeap is a max-heap and we pop minimum entropy
        other
            .entropy_with_noise
            .partial_cmp(&self.entropy_with_noise)
    }
}

impl Ord for CoordEntropy {
    fn cmp(&self, other: &Self) -> Ordering {
        if self < other {
            return Ordering::Less;
        }
        if self == other {
            return Ordering::Equal;
        }
        Ordering::Greater
    }
}

#[derive(Clone)]
struct Observer {
    heuristic: Heuristic,
    entropy_queue: BinaryHeap<CoordEntropy>,
    scan_cursor: usize,
}

impl Observer {
    fn new(heuristic: Heuristic) -> Self {
        Self {
            heuristic,
            entropy_queue: BinaryHeap::new(),
            scan_cursor: 0,
        }
    }
    fn clear(&mut self) {
        self.entropy_queue.clear();
        self.scan_cursor = 0;
    }
    fn choose_next_cell(&mut self, wave: &Wave) -> Option<Coord> {
        match self.heuristic {
            Heuristic::Entropy => {
                while let Some(coord_entropy) = self.entropy_queue.pop() {
                    let cell = wave.grid.get_checked(coord_entropy.coord);
                    if cell.num_possible_patterns
                        == coord_entropy.entropy_with_noise.num_possible_patterns
                        && cell.num_possible_patterns > 1
                    {
                        return Some(coord_entropy.coord);
                    }
                }
                None
            }
            Heuristic::Mrv => wave
                .grid
                .enumerate()
                .filter(|(_, cell)| cell.num_possible_patterns > 1)
                .min_by_key(|(_, cell)| (cell.num_possible_patterns, cell.noise))
                .map(|(coord, _)| coord),
            Heuristic::Scanline => {
                // cells behind the cursor were singletons when it passed
                // them and bans are monotonic, so never look back
                for (index, (coord, cell)) in
                    wave.grid.enumerate().enumerate().skip(self.scan_cursor)
                {
                    if cell.num_possible_patterns > 1 {
                        self.scan_cursor = index;
                        return Some(coord);
                    }
                }
                self.scan_cursor = wave.grid.size().count();
                None
            }
        }
    }
}

#[derive(Debug)]
pub enum Observe {
    Incomplete,
    Complete,
}

#[derive(Clone)]
struct Context {
    propagator: Propagator,
    entropy_changes_by_coord: HashMap<Coord, EntropyWithNoise>,
    observer: Observer,
    num_undecided_cells: u32,
}

impl Context {
    fn new(heuristic: Heuristic) -> Self {
        Self {
            propagator: Propagator::default(),
            entropy_changes_by_coord: HashMap::new(),
            observer: Observer::new(heuristic),
            num_undecided_cells: 0,
        }
    }
    fn clear(&mut self) {
        self.propagator.clear();
        self.observer.clear();
        self.entropy_changes_by_coord.clear();
        self.num_undecided_cells = 0;
    }
    fn init(&mut self, wave: &Wave) {
        self.num_undecided_cells = wave
            .grid
            .iter()
            .filter(|cell| cell.num_possible_patterns > 1)
            .count() as u32;
        if let Heuristic::Entropy = self.observer.heuristic {
            wave.grid.enumerate().for_each(|(coord, cell)| {
                if cell.num_possible_patterns > 1 {
                    self.observer.entropy_queue.push(CoordEntropy {
                        coord,
                        entropy_with_noise: cell.entropy_with_noise(),
                    });
                }
            });
        }
    }
    fn propagate<W: Wrap>(
        &mut self,
        wave: &mut Wave,
        global_stats: &GlobalStats,
    ) -> Result<(), Contradiction> {
        self.propagator.propagate::<W>(
            wave,
            global_stats,
            &mut self.entropy_changes_by_coord,
            &mut self.num_undecided_cells,
        )?;
        if let Heuristic::Entropy = self.observer.heuristic {
            for (coord, entropy_with_noise) in self.entropy_changes_by_coord.drain() {
                self.observer.entropy_queue.push(CoordEntropy {
                    coord,
                    entropy_with_noise,
                });
            }
        }
        Ok(())
    }
    fn observe<R: Rng>(
        &mut self,
        wave: &mut Wave,
        global_stats: &GlobalStats,
        rng: &mut R,
    ) -> Observe {
        if self.num_undecided_cells == 0 {
            return Observe::Complete;
        }
        let coord = match self.observer.choose_next_cell(wave) {
            None => return Observe::Complete,
            Some(coord) => coord,
        };
        let pattern_id = wave
            .grid
            .get_checked(coord)
            .choose_pattern_id(global_stats, rng);
        wave.grid.get_checked_mut(coord).remove_all_patterns_except(
            coord,
            pattern_id,
            global_stats,
            &mut self.propagator,
        );
        assert!(self.num_undecided_cells >= 1);
        self.num_undecided_cells -= 1;
        Observe::Incomplete
    }
}

/// A single solving attempt: a wave plus its transient bookkeeping,
/// borrowing the shared read-only tables. `W` selects bounded or
/// toroidal output.
pub struct Run<'a, W: Wrap> {
    context: Context,
    wave: Wave,
    global_stats: &'a GlobalStats,
    output_wrap: PhantomData<W>,
}

impl<'a, W: Wrap> Run<'a, W> {
    pub fn new<R: Rng>(
        output_size: Size,
        global_stats: &'a GlobalStats,
        heuristic: Heuristic,
        rng: &mut R,
    ) -> Result<Self, SolveError> {
        let mut run = Self {
            context: Context::new(heuristic),
            wave: Wave::new(output_size),
            global_stats,
            output_wrap: PhantomData,
        };
        run.reset(rng)?;
        Ok(run)
    }

    /// Re-initializes the wave for a fresh attempt, re-using the
    /// allocations of the previous one.
    pub fn reset<R: Rng>(&mut self, rng: &mut R) -> Result<(), SolveError> {
        self.context.clear();
        self.wave
            .init::<W, R>(
                self.global_stats,
                &mut self.context.propagator,
                rng,
            )
            .map_err(|_: Contradiction| SolveError::Contradiction)?;
        self.context.init(&self.wave);
        self.context
            .propagate::<W>(&mut self.wave, self.global_stats)
            .map_err(|_: Contradiction| SolveError::Contradiction)
    }

    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<Observe, SolveError> {
        match self
            .context
            .observe(&mut self.wave, self.global_stats, rng)
        {
            Observe::Complete => Ok(Observe::Complete),
            Observe::Incomplete => {
                self.context
                    .propagate::<W>(&mut self.wave, self.global_stats)
                    .map_err(|_: Contradiction| SolveError::Contradiction)?;
                Ok(Observe::Incomplete)
            }
        }
    }

    pub fn collapse<R: Rng>(&mut self, rng: &mut R) -> Result<(), SolveError> {
        self.collapse_cancellable(rng, || false)
    }

    /// As `collapse`, polling `cancel` once per observe iteration.
    pub fn collapse_cancellable<R: Rng, C: FnMut() -> bool>(
        &mut self,
        rng: &mut R,
        mut cancel: C,
    ) -> Result<(), SolveError> {
        loop {
            if cancel() {
                return Err(SolveError::Cancelled);
            }
            match self.step(rng)? {
                Observe::Complete => return Ok(()),
                Observe::Incomplete => (),
            }
        }
    }

    /// Bans a single pattern at a cell and propagates the consequences.
    pub fn forbid_pattern(
        &mut self,
        coord: Coord,
        pattern_id: PatternId,
    ) -> Result<(), SolveError> {
        let cell = self.wave.grid.get_checked_mut(coord);
        match cell.ban(pattern_id, self.global_stats) {
            BanOutcome::AlreadyImpossible => return Ok(()),
            BanOutcome::CellContradicted => return Err(SolveError::Contradiction),
            BanOutcome::CellFinalized => {
                assert!(self.context.num_undecided_cells >= 1);
                self.context.num_undecided_cells -= 1;
                self.context
                    .propagator
                    .push(RemovedPattern { coord, pattern_id });
            }
            BanOutcome::PatternRemoved => self
                .context
                .propagator
                .push(RemovedPattern { coord, pattern_id }),
        }
        self.context
            .propagate::<W>(&mut self.wave, self.global_stats)
            .map_err(|_: Contradiction| SolveError::Contradiction)
    }

    /// Pins a cell to a single pattern and propagates the consequences.
    pub fn forbid_all_patterns_except(
        &mut self,
        coord: Coord,
        pattern_id: PatternId,
    ) -> Result<(), SolveError> {
        let cell = self.wave.grid.get_checked_mut(coord);
        if !cell.is_possible(pattern_id) {
            return Err(SolveError::Contradiction);
        }
        let was_undecided = cell.num_possible_patterns > 1;
        cell.remove_all_patterns_except(
            coord,
            pattern_id,
            self.global_stats,
            &mut self.context.propagator,
        );
        if was_undecided {
            self.context.num_undecided_cells -= 1;
        }
        self.context
            .propagate::<W>(&mut self.wave, self.global_stats)
            .map_err(|_: Contradiction| SolveError::Contradiction)
    }

    pub fn wave(&self) -> &Wave {
        &self.wave
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wrap::{WrapNone, WrapXY};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    // Two patterns, each compatible only with the other in every
    // direction: a checkerboard rule set.
    fn alternating_stats() -> GlobalStats {
        let pattern_weights = (0..2)
            .map(|_| PatternWeight::new(NonZeroU32::new(1).unwrap()))
            .collect::<PatternTable<_>>();
        let compatibility = (0..2)
            .map(|pattern_id| {
                let mut allowed = CardinalDirectionTable::default();
                for direction in CardinalDirections {
                    allowed[direction] = vec![1 - pattern_id as PatternId];
                }
                allowed
            })
            .collect::<PatternTable<_>>();
        GlobalStats::new(pattern_weights, compatibility)
    }

    fn resolved_ids(wave: &Wave) -> Vec<PatternId> {
        wave.grid()
            .iter()
            .map(|cell| {
                assert_eq!(cell.num_possible_patterns(), 1);
                cell.first_possible_pattern_id().unwrap()
            })
            .collect()
    }

    #[test]
    fn collapse_alternating_rules() {
        for heuristic in [Heuristic::Entropy, Heuristic::Mrv, Heuristic::Scanline] {
            let global_stats = alternating_stats();
            let mut rng = XorShiftRng::seed_from_u64(3);
            let mut run: Run<WrapXY> =
                Run::new(Size::new(4, 4), &global_stats, heuristic, &mut rng).unwrap();
            run.collapse(&mut rng).unwrap();
            let ids = resolved_ids(run.wave());
            for y in 0..4 {
                for x in 0..4 {
                    assert_ne!(ids[x + y * 4], ids[(x + 1) % 4 + y * 4]);
                    assert_ne!(ids[x + y * 4], ids[x + ((y + 1) % 4) * 4]);
                }
            }
        }
    }

    #[test]
    fn forbidding_one_pattern_decides_the_whole_wave() {
        let global_stats = alternating_stats();
        let mut rng = XorShiftRng::seed_from_u64(7);
        let mut run: Run<WrapNone> = Run::new(
            Size::new(3, 3),
            &global_stats,
            Heuristic::Entropy,
            &mut rng,
        )
        .unwrap();
        run.forbid_all_patterns_except(Coord::new(0, 0), 0).unwrap();
        run.collapse(&mut rng).unwrap();
        let ids = resolved_ids(run.wave());
        assert_eq!(ids, vec![0, 1, 0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn forbidding_every_pattern_is_a_contradiction() {
        let global_stats = alternating_stats();
        let mut rng = XorShiftRng::seed_from_u64(11);
        let mut run: Run<WrapXY> = Run::new(
            Size::new(4, 4),
            &global_stats,
            Heuristic::Entropy,
            &mut rng,
        )
        .unwrap();
        run.forbid_pattern(Coord::new(1, 1), 0).unwrap();
        assert_eq!(
            run.forbid_pattern(Coord::new(1, 1), 1),
            Err(SolveError::Contradiction),
        );
    }

    #[test]
    fn cancellation_fires_before_the_first_observation() {
        let global_stats = alternating_stats();
        let mut rng = XorShiftRng::seed_from_u64(13);
        let mut run: Run<WrapXY> = Run::new(
            Size::new(4, 4),
            &global_stats,
            Heuristic::Entropy,
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            run.collapse_cancellable(&mut rng, || true),
            Err(SolveError::Cancelled),
        );
    }

    #[test]
    fn entropy_of_two_uniform_patterns_is_one_bit() {
        let global_stats = alternating_stats();
        let mut rng = XorShiftRng::seed_from_u64(17);
        let mut wave = Wave::new(Size::new(1, 1));
        let mut propagator = Propagator::default();
        assert!(wave
            .init::<WrapNone, _>(&global_stats, &mut propagator, &mut rng)
            .is_ok());
        let two_left = wave.grid.get_checked(Coord::new(0, 0)).entropy_with_noise();
        assert!((two_left.entropy - 1.0).abs() < 1e-6);
    }
}
