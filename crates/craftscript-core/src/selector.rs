//! Egocentric selectors and heading math.
//!
//! A [`Selector`] describes a position relative to the actor, such as
//! `F3+R1` ("three blocks ahead, one to the right"). Horizontal axes are
//! interpreted against the actor's current [`Heading`], which is obtained by
//! snapping a continuous yaw to the nearest cardinal direction. Vertical axes
//! always map to absolute world Y.
//!
//! # Example
//!
//! ```
//! use craftscript_core::selector::{Axis, Heading, HeadingContext, SelTerm, Selector, Vec3};
//!
//! let sel = Selector::new(vec![SelTerm::new(Axis::F, 3), SelTerm::new(Axis::R, 1)]);
//! let ctx = HeadingContext::new(Heading::N, Vec3::new(0, 64, 0));
//!
//! assert_eq!(sel.resolve(&ctx), Ok(Vec3::new(1, 64, -3)));
//! assert_eq!(sel.key(), "F3+R1");
//! ```

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::{Add, Neg};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An integer block position or offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0, y: 0, z: 0 };
    pub const UP: Vec3 = Vec3 { x: 0, y: 1, z: 0 };
    pub const DOWN: Vec3 = Vec3 { x: 0, y: -1, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn checked_scale(self, k: i32) -> Option<Self> {
        Some(Self::new(
            self.x.checked_mul(k)?,
            self.y.checked_mul(k)?,
            self.z.checked_mul(k)?,
        ))
    }

    pub fn checked_add(self, rhs: Vec3) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(rhs.x)?,
            self.y.checked_add(rhs.y)?,
            self.z.checked_add(rhs.z)?,
        ))
    }

    /// Squared euclidean distance, used to pick the nearest of several candidates.
    pub fn distance_sq(self, other: Vec3) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        let dz = self.z as i64 - other.z as i64;
        dx * dx + dy * dy + dz * dz
    }
}

/// Saturates at the edge of the coordinate range.
impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(
            self.x.saturating_add(rhs.x),
            self.y.saturating_add(rhs.y),
            self.z.saturating_add(rhs.z),
        )
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(self.x.saturating_neg(), self.y.saturating_neg(), self.z.saturating_neg())
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the four cardinal facing directions.
///
/// The declaration order `N, E, S, W` is significant: when a yaw lies exactly
/// between two centers, the heading declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    N,
    E,
    S,
    W,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::N, Heading::E, Heading::S, Heading::W];

    /// Yaw center in radians, counter-clockwise seen from above, north = 0.
    pub fn center(self) -> f64 {
        match self {
            Heading::N => 0.0,
            Heading::W => PI / 2.0,
            Heading::S => PI,
            Heading::E => 3.0 * PI / 2.0,
        }
    }

    /// Snaps a continuous yaw to the nearest cardinal heading.
    ///
    /// Angular distance wraps around the full circle, so a yaw just below
    /// `2π` snaps to north. Non-finite input snaps to north.
    pub fn from_yaw(yaw: f64) -> Self {
        let yaw = yaw.rem_euclid(TAU);
        let mut best = Heading::N;
        let mut best_distance = f64::INFINITY;
        for heading in Heading::ALL {
            let d = (yaw - heading.center()).abs();
            let d = d.min(TAU - d);
            if d < best_distance {
                best = heading;
                best_distance = d;
            }
        }
        best
    }

    pub fn forward(self) -> Vec3 {
        match self {
            Heading::N => Vec3::new(0, 0, -1),
            Heading::E => Vec3::new(1, 0, 0),
            Heading::S => Vec3::new(0, 0, 1),
            Heading::W => Vec3::new(-1, 0, 0),
        }
    }

    pub fn right(self) -> Vec3 {
        match self {
            Heading::N => Vec3::new(1, 0, 0),
            Heading::E => Vec3::new(0, 0, 1),
            Heading::S => Vec3::new(-1, 0, 0),
            Heading::W => Vec3::new(0, 0, -1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Heading::N => "north",
            Heading::E => "east",
            Heading::S => "south",
            Heading::W => "west",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "n" | "north" => Some(Heading::N),
            "e" | "east" => Some(Heading::E),
            "s" | "south" => Some(Heading::S),
            "w" | "west" => Some(Heading::W),
            _ => None,
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selector axis: forward, back, right, left, up, down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    F,
    B,
    R,
    L,
    U,
    D,
}

impl Axis {
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'f' => Some(Axis::F),
            'b' => Some(Axis::B),
            'r' => Some(Axis::R),
            'l' => Some(Axis::L),
            'u' => Some(Axis::U),
            'd' => Some(Axis::D),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Axis::F => 'F',
            Axis::B => 'B',
            Axis::R => 'R',
            Axis::L => 'L',
            Axis::U => 'U',
            Axis::D => 'D',
        }
    }

    /// Unit vector for this axis under `heading`.
    pub fn basis(self, heading: Heading) -> Vec3 {
        match self {
            Axis::F => heading.forward(),
            Axis::B => -heading.forward(),
            Axis::R => heading.right(),
            Axis::L => -heading.right(),
            Axis::U => Vec3::UP,
            Axis::D => Vec3::DOWN,
        }
    }

    /// Splits an axis word such as `f`, `B3` or `u12` into axis and magnitude.
    ///
    /// Returns `None` for anything that is not an axis letter followed only by
    /// ASCII digits. An omitted magnitude is reported as `None`.
    pub fn parse_word(word: &str) -> Option<(Axis, Option<&str>)> {
        let mut chars = word.chars();
        let axis = Axis::from_letter(chars.next()?)?;
        let rest = chars.as_str();
        if rest.is_empty() {
            Some((axis, None))
        } else if rest.bytes().all(|b| b.is_ascii_digit()) {
            Some((axis, Some(rest)))
        } else {
            None
        }
    }

    /// Whether `word` lexes as a selector term rather than an identifier.
    pub fn is_axis_word(word: &str) -> bool {
        Self::parse_word(word).is_some()
    }
}

/// A single selector term: axis times signed magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelTerm {
    pub axis: Axis,
    pub magnitude: i32,
}

impl SelTerm {
    pub fn new(axis: Axis, magnitude: i32) -> Self {
        Self { axis, magnitude }
    }

    /// `None` when the magnitude does not fit in block coordinates.
    pub fn offset(&self, heading: Heading) -> Option<Vec3> {
        self.axis.basis(heading).checked_scale(self.magnitude)
    }
}

/// Heading and origin used when resolving relative selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingContext {
    pub heading: Heading,
    pub position: Vec3,
}

impl HeadingContext {
    pub fn new(heading: Heading, position: Vec3) -> Self {
        Self { heading, position }
    }
}

/// The actor's continuous facing and block position as reported by the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub yaw: f64,
    pub position: Vec3,
}

impl Pose {
    pub fn new(yaw: f64, position: Vec3) -> Self {
        Self { yaw, position }
    }

    pub fn heading(&self) -> Heading {
        Heading::from_yaw(self.yaw)
    }

    pub fn context(&self) -> HeadingContext {
        HeadingContext::new(self.heading(), self.position)
    }
}

/// A selector whose offset or target falls outside block coordinates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("selector {selector} is out of coordinate range")]
pub struct CoordinateOverflow {
    pub selector: String,
}

/// An ordered chain of selector terms composed by vector addition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selector {
    pub terms: Vec<SelTerm>,
}

impl Selector {
    pub fn new(terms: Vec<SelTerm>) -> Self {
        Self { terms }
    }

    /// Offset relative to the actor under `heading`.
    pub fn offset(&self, heading: Heading) -> Result<Vec3, CoordinateOverflow> {
        self.terms
            .iter()
            .try_fold(Vec3::ZERO, |acc, term| acc.checked_add(term.offset(heading)?))
            .ok_or_else(|| self.overflow())
    }

    /// Absolute position for this selector in `ctx`.
    pub fn resolve(&self, ctx: &HeadingContext) -> Result<Vec3, CoordinateOverflow> {
        ctx.position
            .checked_add(self.offset(ctx.heading)?)
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> CoordinateOverflow {
        CoordinateOverflow { selector: self.key() }
    }

    pub fn key(&self) -> String {
        selector_to_key(self)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Canonical, order-preserving identity for a selector, e.g. `F3+R1`.
pub fn selector_to_key(selector: &Selector) -> String {
    selector
        .terms
        .iter()
        .map(|t| format!("{}{}", t.axis.letter(), t.magnitude))
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn sel(terms: &[(Axis, i32)]) -> Selector {
        Selector::new(terms.iter().map(|&(a, m)| SelTerm::new(a, m)).collect())
    }

    #[test]
    fn yaw_snaps_to_nearest_center() {
        assert_eq!(Heading::from_yaw(0.1), Heading::N);
        assert_eq!(Heading::from_yaw(PI / 2.0 + 0.2), Heading::W);
        assert_eq!(Heading::from_yaw(PI - 0.3), Heading::S);
        assert_eq!(Heading::from_yaw(3.0 * PI / 2.0), Heading::E);
        assert_eq!(Heading::from_yaw(TAU - 0.05), Heading::N);
        assert_eq!(Heading::from_yaw(-PI / 2.0), Heading::E);
    }

    #[test]
    fn yaw_tie_resolves_in_declaration_order() {
        // Halfway between N (0) and W (pi/2): N is declared first.
        assert_eq!(Heading::from_yaw(FRAC_PI_4), Heading::N);
    }

    #[test]
    fn non_finite_yaw_snaps_north() {
        assert_eq!(Heading::from_yaw(f64::NAN), Heading::N);
    }

    #[test]
    fn basis_is_right_handed_per_heading() {
        for h in Heading::ALL {
            let f = h.forward();
            let r = h.right();
            // Horizontal unit vectors, perpendicular to each other.
            assert_eq!(f.y, 0);
            assert_eq!(r.y, 0);
            assert_eq!(f.x * r.x + f.z * r.z, 0);
            assert_eq!(f.distance_sq(Vec3::ZERO), 1);
        }
    }

    #[test]
    fn f3_r1_differs_between_north_and_east() {
        let s = sel(&[(Axis::F, 3), (Axis::R, 1)]);
        let north = s.offset(Heading::N).unwrap();
        let east = s.offset(Heading::E).unwrap();
        assert_eq!(north, Vec3::new(1, 0, -3));
        assert_eq!(east, Vec3::new(3, 0, 1));
        assert_ne!(north, east);
    }

    #[test]
    fn vertical_axes_ignore_heading() {
        let s = sel(&[(Axis::U, 2), (Axis::D, 1)]);
        for h in Heading::ALL {
            assert_eq!(s.offset(h), Ok(Vec3::new(0, 1, 0)));
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        let s = sel(&[(Axis::L, 2), (Axis::B, -1)]);
        let ctx = HeadingContext::new(Heading::S, Vec3::new(10, 70, -4));
        assert_eq!(s.resolve(&ctx), s.resolve(&ctx));
        assert_eq!(s.resolve(&ctx), Ok(Vec3::new(12, 70, -3)));
    }

    #[test]
    fn overflowing_selector_is_an_error() {
        let s = sel(&[(Axis::F, i32::MAX), (Axis::F, 2)]);
        let err = s.offset(Heading::S).unwrap_err();
        assert_eq!(err.selector, format!("F{}+F2", i32::MAX));

        let far = sel(&[(Axis::U, 10)]);
        let ctx = HeadingContext::new(Heading::N, Vec3::new(0, i32::MAX - 5, 0));
        assert!(far.resolve(&ctx).is_err());

        // Forward under N is -Z, so the magnitude is negated.
        let wide = sel(&[(Axis::F, i32::MIN)]);
        assert!(wide.offset(Heading::N).is_err());
    }

    #[test]
    fn add_saturates() {
        let edge = Vec3::new(i32::MAX, 0, i32::MIN);
        assert_eq!(edge + Vec3::new(1, 1, -1), Vec3::new(i32::MAX, 1, i32::MIN));
        assert_eq!(-Vec3::new(i32::MIN, 0, 0), Vec3::new(i32::MAX, 0, 0));
    }

    #[test]
    fn key_tracks_axis_magnitude_and_order() {
        let a = sel(&[(Axis::F, 3), (Axis::R, 1)]);
        assert_eq!(a.key(), "F3+R1");
        assert_eq!(a.key(), sel(&[(Axis::F, 3), (Axis::R, 1)]).key());
        assert_ne!(a.key(), sel(&[(Axis::R, 1), (Axis::F, 3)]).key());
        assert_ne!(a.key(), sel(&[(Axis::F, 2), (Axis::R, 1)]).key());
        assert_ne!(a.key(), sel(&[(Axis::F, 3), (Axis::L, 1)]).key());
        assert_eq!(sel(&[(Axis::F, -1)]).key(), "F-1");
    }

    #[test]
    fn parse_axis_words() {
        assert_eq!(Axis::parse_word("f"), Some((Axis::F, None)));
        assert_eq!(Axis::parse_word("B3"), Some((Axis::B, Some("3"))));
        assert!(Axis::is_axis_word("u12"));
        assert!(!Axis::is_axis_word("forward"));
        assert!(!Axis::is_axis_word("x1"));
        assert!(!Axis::is_axis_word(""));
    }

    #[test]
    fn heading_names_roundtrip() {
        for h in Heading::ALL {
            assert_eq!(Heading::from_name(h.name()), Some(h));
        }
        assert_eq!(Heading::from_name("up"), None);
    }
}
