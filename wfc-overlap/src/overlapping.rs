use crate::err::{ConfigError, SolveError};
use crate::symmetry;
use crate::wfc::{
    GlobalStats, Heuristic, PatternId, PatternTable, PatternWeight, Run, Wave,
};
use crate::wrap::{Wrap, WrapNone, WrapXY};
use coord_2d::{Coord, Size};
use direction::{CardinalDirectionTable, CardinalDirections};
use grid_2d::Grid;
use hashbrown::HashMap;
use rand::Rng;
use std::num::NonZeroU32;

/// Palette indices are stored as `u8`.
const MAX_COLORS: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Exemplar dimensions in pixels.
    pub input_size: Size,
    /// Output dimensions in pixels.
    pub output_size: Size,
    /// Edge length of the square patterns, typically 2 to 4.
    pub pattern_size: NonZeroU32,
    /// Sample the exemplar toroidally.
    pub periodic_input: bool,
    /// Produce a toroidal output.
    pub periodic_output: bool,
    /// Number of dihedral variants applied during extraction, 1 to 8.
    pub symmetry: u32,
    pub heuristic: Heuristic,
    /// Pin the bottom output row to the last extracted pattern.
    pub ground: bool,
}

impl Options {
    pub fn wave_size(&self) -> Size {
        if self.periodic_output {
            self.output_size
        } else {
            let n = self.pattern_size.get();
            Size::new(
                self.output_size.width() - n + 1,
                self.output_size.height() - n + 1,
            )
        }
    }
}

/// The result of reading an output image back out of a wave. `contradicted`
/// is set when some cell had no remaining pattern; such pixels are rendered
/// from the first pattern in the table.
pub struct DecodedOutput {
    pub grid: Grid<[u8; 3]>,
    pub contradicted: bool,
}

/// Base-C positional encoding of a pattern's palette indices. Distinct
/// patterns have distinct fingerprints as long as `colors ^ (n * n)` fits
/// in a `u64`, which is validated at session construction.
fn fingerprint(pattern: &[u8], colors: u64) -> u64 {
    pattern
        .iter()
        .fold(0, |acc, &index| acc * colors + u64::from(index))
}

/// Inverts `fingerprint`, most significant digit first.
fn pattern_from_fingerprint(fingerprint: u64, colors: u64, len: usize) -> Vec<u8> {
    let mut power = colors.pow(len as u32 - 1);
    let mut residue = fingerprint;
    let mut pattern = vec![0u8; len];
    for texel in pattern.iter_mut() {
        *texel = (residue / power) as u8;
        residue %= power;
        power = (power / colors).max(1);
    }
    pattern
}

/// Do `p1` and `p2` agree on the overlap when `p2` is placed at offset
/// `(dx, dy)` from `p1`?
fn agrees(p1: &[u8], p2: &[u8], n: usize, dx: i32, dy: i32) -> bool {
    let n = n as i32;
    let xmin = dx.max(0);
    let xmax = if dx < 0 { dx + n } else { n };
    let ymin = dy.max(0);
    let ymax = if dy < 0 { dy + n } else { n };
    for y in ymin..ymax {
        for x in xmin..xmax {
            if p1[(x + n * y) as usize] != p2[((x - dx) + n * (y - dy)) as usize] {
                return false;
            }
        }
    }
    true
}

fn ground_failure(error: SolveError) -> SolveError {
    match error {
        SolveError::Contradiction => SolveError::GroundFailure,
        other => other,
    }
}

/// An overlapping-model session: the palette, pattern and compatibility
/// tables extracted from one exemplar. Built once; each `collapse` call
/// spawns a solver run borrowing the shared tables.
pub struct Overlapping {
    options: Options,
    palette: Vec<u32>,
    patterns: PatternTable<Vec<u8>>,
    global_stats: GlobalStats,
}

impl Overlapping {
    /// Validates `options` against the exemplar, then builds the pattern
    /// table (deduplicated by fingerprint, in first-observed order) and
    /// the four directional compatibility tables.
    pub fn new(options: Options, input: &Grid<u32>) -> Result<Self, ConfigError> {
        let n = options.pattern_size.get();
        if options.symmetry < 1 || options.symmetry > symmetry::MAX_VARIANTS {
            return Err(ConfigError::SymmetryOutOfRange(options.symmetry));
        }
        if input.size() != options.input_size {
            return Err(ConfigError::InputSizeMismatch {
                declared_width: options.input_size.width(),
                declared_height: options.input_size.height(),
                actual_width: input.size().width(),
                actual_height: input.size().height(),
            });
        }
        if options.output_size.width() < n || options.output_size.height() < n {
            return Err(ConfigError::OutputTooSmall {
                output_width: options.output_size.width(),
                output_height: options.output_size.height(),
                pattern_size: n,
            });
        }
        let input_size = options.input_size;
        let input_fits_pattern =
            input_size.width() >= n && input_size.height() >= n;
        if input_size.count() == 0
            || (!options.periodic_input && !input_fits_pattern)
        {
            return Err(ConfigError::ExemplarTooSmall {
                input_width: input_size.width(),
                input_height: input_size.height(),
                pattern_size: n,
            });
        }

        // Palette in first-appearance order; pixels re-encoded as indices.
        let mut palette: Vec<u32> = Vec::new();
        let mut color_indices: HashMap<u32, usize> = HashMap::new();
        let mut sample: Vec<u8> = Vec::with_capacity(input_size.count());
        for &color in input.iter() {
            let index = *color_indices.entry(color).or_insert_with(|| {
                palette.push(color);
                palette.len() - 1
            });
            if palette.len() > MAX_COLORS {
                return Err(ConfigError::PaletteTooLarge(palette.len()));
            }
            sample.push(index as u8);
        }
        let colors = palette.len() as u64;

        // The fingerprint space must fit in u64.
        let mut top = 1u64;
        for _ in 0..n * n {
            top = top
                .checked_mul(colors)
                .ok_or(ConfigError::FingerprintOverflow {
                    colors: palette.len(),
                    pattern_size: n,
                })?;
        }

        let n = n as usize;
        let width = input_size.width() as usize;
        let height = input_size.height() as usize;
        let (xmax, ymax) = if options.periodic_input {
            (width, height)
        } else {
            (width - n + 1, height - n + 1)
        };

        let mut counts: HashMap<u64, u32> = HashMap::new();
        let mut ordering: Vec<u64> = Vec::new();
        let mut window = vec![0u8; n * n];
        for y in 0..ymax {
            for x in 0..xmax {
                for dy in 0..n {
                    for dx in 0..n {
                        window[dx + dy * n] =
                            sample[(x + dx) % width + ((y + dy) % height) * width];
                    }
                }
                for variant in symmetry::variants(&window, n, options.symmetry) {
                    let fingerprint = fingerprint(&variant, colors);
                    let count = counts.entry(fingerprint).or_insert(0);
                    if *count == 0 {
                        ordering.push(fingerprint);
                    }
                    *count += 1;
                }
            }
        }

        let patterns = ordering
            .iter()
            .map(|&fingerprint| pattern_from_fingerprint(fingerprint, colors, n * n))
            .collect::<PatternTable<_>>();
        let pattern_weights = ordering
            .iter()
            .map(|&fingerprint| {
                let count = counts[&fingerprint];
                PatternWeight::new(
                    NonZeroU32::new(count)
                        .expect("every recorded fingerprint was counted"),
                )
            })
            .collect::<PatternTable<_>>();

        let compatibility = patterns
            .iter()
            .map(|p1| {
                let mut allowed_neighbours = CardinalDirectionTable::default();
                for direction in CardinalDirections {
                    let Coord { x: dx, y: dy } = direction.coord();
                    allowed_neighbours[direction] = patterns
                        .enumerate()
                        .filter(|&(_, p2)| agrees(p1, p2, n, dx, dy))
                        .map(|(pattern_id, _)| pattern_id)
                        .collect::<Vec<_>>();
                }
                allowed_neighbours
            })
            .collect::<PatternTable<_>>();

        let global_stats = GlobalStats::new(pattern_weights, compatibility);
        tracing::debug!(
            patterns = patterns.len(),
            colors = palette.len(),
            "extracted overlapping patterns"
        );
        Ok(Self {
            options,
            palette,
            patterns,
            global_stats,
        })
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }
    pub fn pattern(&self, pattern_id: PatternId) -> &[u8] {
        &self.patterns[pattern_id]
    }
    pub fn weight(&self, pattern_id: PatternId) -> u32 {
        self.global_stats.weight(pattern_id)
    }
    pub fn palette(&self) -> &[u32] {
        &self.palette
    }
    pub fn global_stats(&self) -> &GlobalStats {
        &self.global_stats
    }
    pub fn wave_size(&self) -> Size {
        self.options.wave_size()
    }

    /// One solving attempt with the session's tables and a fresh wave.
    pub fn collapse<R: Rng>(&self, rng: &mut R) -> Result<Grid<[u8; 3]>, SolveError> {
        self.collapse_cancellable(rng, || false)
    }

    /// As `collapse`, polling `cancel` once per observe iteration.
    pub fn collapse_cancellable<R: Rng, C: FnMut() -> bool>(
        &self,
        rng: &mut R,
        cancel: C,
    ) -> Result<Grid<[u8; 3]>, SolveError> {
        if self.options.periodic_output {
            self.collapse_wrap::<WrapXY, R, C>(rng, cancel)
        } else {
            self.collapse_wrap::<WrapNone, R, C>(rng, cancel)
        }
    }

    fn collapse_wrap<W: Wrap, R: Rng, C: FnMut() -> bool>(
        &self,
        rng: &mut R,
        cancel: C,
    ) -> Result<Grid<[u8; 3]>, SolveError> {
        let mut run: Run<W> = Run::new(
            self.wave_size(),
            &self.global_stats,
            self.options.heuristic,
            rng,
        )?;
        if self.options.ground {
            self.init_ground(&mut run)?;
        }
        run.collapse_cancellable(rng, cancel)?;
        Ok(self.decode(run.wave()).grid)
    }

    /// Pins the bottom wave row to the last pattern in the table and bans
    /// that pattern from every other row. A contradiction here means the
    /// ground constraint itself is unsatisfiable.
    fn init_ground<W: Wrap>(&self, run: &mut Run<W>) -> Result<(), SolveError> {
        let ground_pattern = (self.num_patterns() - 1) as PatternId;
        let width = self.wave_size().width() as i32;
        let height = self.wave_size().height() as i32;
        for x in 0..width {
            run.forbid_all_patterns_except(Coord::new(x, height - 1), ground_pattern)
                .map_err(ground_failure)?;
            for y in 0..height - 1 {
                run.forbid_pattern(Coord::new(x, y), ground_pattern)
                    .map_err(ground_failure)?;
            }
        }
        Ok(())
    }

    /// Reads the output image out of a wave. Each output pixel takes its
    /// color from the pattern of the cell whose window covers it; beyond
    /// the last cell of a bounded wave, pixels read deeper texels of the
    /// edge cells.
    pub fn decode(&self, wave: &Wave) -> DecodedOutput {
        let n = self.options.pattern_size.get() as i32;
        let wave_width = wave.size().width() as i32;
        let wave_height = wave.size().height() as i32;
        let mut contradicted = false;
        let grid = Grid::new_fn(self.options.output_size, |Coord { x, y }| {
            let (cell_x, dx) = if x < wave_width {
                (x, 0)
            } else {
                (x - (n - 1), n - 1)
            };
            let (cell_y, dy) = if y < wave_height {
                (y, 0)
            } else {
                (y - (n - 1), n - 1)
            };
            let cell = wave.grid().get_checked(Coord::new(cell_x, cell_y));
            let pattern_id = match cell.first_possible_pattern_id() {
                Some(pattern_id) => pattern_id,
                None => {
                    contradicted = true;
                    0
                }
            };
            let texel = self.patterns[pattern_id][(dx + dy * n) as usize];
            let color = self.palette[texel as usize];
            [
                ((color >> 16) & 0xff) as u8,
                ((color >> 8) & 0xff) as u8,
                (color & 0xff) as u8,
            ]
        });
        if contradicted {
            tracing::warn!(
                "decoded a wave with a contradicted cell; substituted the first pattern"
            );
        }
        DecodedOutput { grid, contradicted }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const WHITE: u32 = 0xffffff;
    const BLACK: u32 = 0x000000;
    const RED: u32 = 0xff0000;

    fn grid_from_rows(rows: &[&[u32]]) -> Grid<u32> {
        let size = Size::new(rows[0].len() as u32, rows.len() as u32);
        Grid::new_fn(size, |Coord { x, y }| rows[y as usize][x as usize])
    }

    fn options(input: &Grid<u32>, pattern_size: u32) -> Options {
        Options {
            input_size: input.size(),
            output_size: Size::new(8, 8),
            pattern_size: NonZeroU32::new(pattern_size).unwrap(),
            periodic_input: false,
            periodic_output: false,
            symmetry: 1,
            heuristic: Heuristic::Entropy,
            ground: false,
        }
    }

    fn all_patterns(session: &Overlapping) -> Vec<Vec<u8>> {
        (0..session.num_patterns())
            .map(|pattern_id| session.pattern(pattern_id as PatternId).to_vec())
            .collect()
    }

    #[test]
    fn palette_is_in_first_appearance_order() {
        let input = grid_from_rows(&[&[RED, WHITE], &[RED, BLACK]]);
        let session = Overlapping::new(
            Options {
                periodic_input: true,
                ..options(&input, 2)
            },
            &input,
        )
        .unwrap();
        assert_eq!(session.palette(), &[RED, WHITE, BLACK]);
    }

    #[test]
    fn fingerprint_round_trips() {
        for pattern in [
            vec![0, 0, 0, 0],
            vec![4, 3, 2, 1],
            vec![0, 1, 0, 1],
            vec![4, 4, 4, 4],
        ] {
            let fp = fingerprint(&pattern, 5);
            assert_eq!(pattern_from_fingerprint(fp, 5, 4), pattern);
        }
    }

    #[test]
    fn agrees_on_overlaps() {
        // ab   bc
        // cd   da
        let p1 = [0, 1, 2, 3];
        let p2 = [1, 2, 3, 0];
        assert!(agrees(&p1, &p2, 2, 1, 0));
        assert!(!agrees(&p2, &p1, 2, 1, 0));
        assert!(agrees(&p2, &p1, 2, -1, 0));
        assert!(agrees(&p1, &p1, 2, 0, 0));
        assert!(!agrees(&p1, &p2, 2, 0, 1));
    }

    #[test]
    fn single_color_exemplar_has_one_pattern() {
        let input = grid_from_rows(&[
            &[WHITE, WHITE, WHITE, WHITE],
            &[WHITE, WHITE, WHITE, WHITE],
            &[WHITE, WHITE, WHITE, WHITE],
            &[WHITE, WHITE, WHITE, WHITE],
        ]);
        let session = Overlapping::new(options(&input, 3), &input).unwrap();
        assert_eq!(session.num_patterns(), 1);
        assert_eq!(session.weight(0), 4);
        assert_eq!(session.pattern(0), &[0; 9]);
    }

    #[test]
    fn vertical_stripes_have_two_patterns() {
        let input = grid_from_rows(&[
            &[BLACK, WHITE, BLACK, WHITE],
            &[BLACK, WHITE, BLACK, WHITE],
            &[BLACK, WHITE, BLACK, WHITE],
            &[BLACK, WHITE, BLACK, WHITE],
        ]);
        let session = Overlapping::new(options(&input, 2), &input).unwrap();
        assert_eq!(session.num_patterns(), 2);
        // 3x3 origins, one variant each
        let total: u32 = (0..session.num_patterns())
            .map(|id| session.weight(id as PatternId))
            .sum();
        assert_eq!(total, 9);
        assert_eq!(session.pattern(0), &[0, 1, 0, 1]);
        assert_eq!(session.pattern(1), &[1, 0, 1, 0]);
    }

    #[test]
    fn symmetry_eight_is_the_dihedral_closure_of_symmetry_one() {
        let input = grid_from_rows(&[
            &[RED, WHITE, BLACK],
            &[WHITE, WHITE, WHITE],
            &[BLACK, WHITE, RED],
        ]);
        let base = Overlapping::new(options(&input, 2), &input).unwrap();
        let full = Overlapping::new(
            Options {
                symmetry: 8,
                ..options(&input, 2)
            },
            &input,
        )
        .unwrap();
        let mut expected: Vec<Vec<u8>> = all_patterns(&base)
            .iter()
            .flat_map(|pattern| crate::symmetry::variants(pattern, 2, 8))
            .collect();
        expected.sort();
        expected.dedup();
        let mut actual = all_patterns(&full);
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn weights_count_every_enumerated_variant() {
        let input = grid_from_rows(&[
            &[RED, WHITE, BLACK],
            &[WHITE, WHITE, WHITE],
            &[BLACK, WHITE, RED],
        ]);
        for symmetry in 1..=8 {
            let session = Overlapping::new(
                Options {
                    symmetry,
                    periodic_input: true,
                    ..options(&input, 2)
                },
                &input,
            )
            .unwrap();
            let total: u32 = (0..session.num_patterns())
                .map(|id| session.weight(id as PatternId))
                .sum();
            assert_eq!(total, symmetry * 9);
        }
    }

    #[test]
    fn compatibility_is_symmetric() {
        let input = grid_from_rows(&[
            &[RED, WHITE, BLACK, WHITE],
            &[WHITE, BLACK, WHITE, RED],
            &[BLACK, WHITE, RED, WHITE],
            &[WHITE, RED, WHITE, BLACK],
        ]);
        let session = Overlapping::new(
            Options {
                symmetry: 2,
                periodic_input: true,
                ..options(&input, 2)
            },
            &input,
        )
        .unwrap();
        let stats = session.global_stats();
        for direction in CardinalDirections {
            for p1 in 0..session.num_patterns() as PatternId {
                for p2 in 0..session.num_patterns() as PatternId {
                    let forward = stats
                        .compatible_patterns_in_direction(p1, direction)
                        .any(|&q| q == p2);
                    let backward = stats
                        .compatible_patterns_in_direction(p2, direction.opposite())
                        .any(|&q| q == p1);
                    assert_eq!(forward, backward);
                }
            }
        }
    }

    #[test]
    fn rejects_bad_configurations() {
        let input = grid_from_rows(&[&[WHITE, BLACK], &[BLACK, WHITE]]);
        assert!(matches!(
            Overlapping::new(
                Options {
                    symmetry: 0,
                    ..options(&input, 2)
                },
                &input,
            ),
            Err(ConfigError::SymmetryOutOfRange(0)),
        ));
        assert!(matches!(
            Overlapping::new(
                Options {
                    symmetry: 9,
                    ..options(&input, 2)
                },
                &input,
            ),
            Err(ConfigError::SymmetryOutOfRange(9)),
        ));
        assert!(matches!(
            Overlapping::new(
                Options {
                    output_size: Size::new(8, 2),
                    ..options(&input, 3)
                },
                &input,
            ),
            Err(ConfigError::OutputTooSmall { .. }),
        ));
        assert!(matches!(
            Overlapping::new(options(&input, 3), &input),
            Err(ConfigError::ExemplarTooSmall { .. }),
        ));
        assert!(matches!(
            Overlapping::new(
                Options {
                    input_size: Size::new(3, 2),
                    ..options(&input, 2)
                },
                &input,
            ),
            Err(ConfigError::InputSizeMismatch { .. }),
        ));
        // a periodic input smaller than the pattern is fine
        assert!(Overlapping::new(
            Options {
                periodic_input: true,
                ..options(&input, 3)
            },
            &input,
        )
        .is_ok());
    }

    #[test]
    fn rejects_fingerprint_overflow() {
        // 16 distinct colors and a 4x4 pattern: 16^16 does not fit in u64.
        let pixels: Vec<u32> = (0..16).collect();
        let rows: Vec<&[u32]> = pixels.chunks(4).collect();
        let input = grid_from_rows(&rows);
        assert!(matches!(
            Overlapping::new(options(&input, 4), &input),
            Err(ConfigError::FingerprintOverflow { .. }),
        ));
    }
}
