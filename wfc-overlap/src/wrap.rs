use coord_2d::{Coord, Size};

pub trait Wrap: Clone + private::Sealed {
    #[doc(hidden)]
    fn normalize_coord(coord: Coord, size: Size) -> Option<Coord>;
}

/// Bounded output: coordinates outside the wave have no cell.
#[derive(Clone, Copy, Debug)]
pub struct WrapNone;

/// Toroidal output: coordinates wrap on both axes.
#[derive(Clone, Copy, Debug)]
pub struct WrapXY;

impl Wrap for WrapNone {
    fn normalize_coord(coord: Coord, size: Size) -> Option<Coord> {
        if coord.is_valid(size) {
            Some(coord)
        } else {
            None
        }
    }
}

impl Wrap for WrapXY {
    fn normalize_coord(coord: Coord, size: Size) -> Option<Coord> {
        Some(coord.normalize(size))
    }
}

mod private {
    use super::*;

    pub trait Sealed {}

    impl Sealed for WrapNone {}
    impl Sealed for WrapXY {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wraps() {
        assert_eq! {
            WrapNone::normalize_coord(Coord::new(2, 3), Size::new(4, 5)),
            Some(Coord::new(2, 3))
        };
        assert_eq! {
            WrapNone::normalize_coord(Coord::new(4, 3), Size::new(4, 5)),
            None,
        };
        assert_eq! {
            WrapNone::normalize_coord(Coord::new(0, -1), Size::new(4, 5)),
            None,
        };
        assert_eq! {
            WrapXY::normalize_coord(Coord::new(2, 6), Size::new(4, 5)),
            Some(Coord::new(2, 1)),
        };
        assert_eq! {
            WrapXY::normalize_coord(Coord::new(-1, 0), Size::new(4, 5)),
            Some(Coord::new(3, 0)),
        };
    }
}
