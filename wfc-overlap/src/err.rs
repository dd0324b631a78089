#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("symmetry must be between 1 and 8, got {0}")]
    SymmetryOutOfRange(u32),
    #[error(
        "output of {output_width}x{output_height} cannot fit a \
         {pattern_size}x{pattern_size} pattern"
    )]
    OutputTooSmall {
        output_width: u32,
        output_height: u32,
        pattern_size: u32,
    },
    #[error(
        "exemplar of {input_width}x{input_height} cannot fit a \
         {pattern_size}x{pattern_size} pattern unless the input is periodic"
    )]
    ExemplarTooSmall {
        input_width: u32,
        input_height: u32,
        pattern_size: u32,
    },
    #[error(
        "exemplar grid is {actual_width}x{actual_height} but the options \
         declare {declared_width}x{declared_height}"
    )]
    InputSizeMismatch {
        declared_width: u32,
        declared_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("exemplar has {0} distinct colors; at most 256 are supported")]
    PaletteTooLarge(usize),
    #[error(
        "{colors} colors with a pattern size of {pattern_size} overflows the \
         64-bit pattern fingerprint"
    )]
    FingerprintOverflow { colors: usize, pattern_size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error("propagation removed the last candidate pattern from a cell")]
    Contradiction,
    #[error("the ground constraint propagated to a contradiction")]
    GroundFailure,
    #[error("the run was cancelled by the caller")]
    Cancelled,
}
