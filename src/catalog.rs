//! Segment/Composite Catalog - Fixed Puzzle Topology
//!
//! The base geometry table and the corner-adjustment table are merged once,
//! when a [`Catalog`] is built. Nothing mutates a catalog afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{Adjustment, Corner, CornerAdjustments};
use crate::error::{ProcessError, Result};

/// Grid coordinate in `[0, 4] x [0, 4]`.
pub type GridPoint = (u32, u32);

pub const GRID_CELLS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentId {
    #[serde(rename = "option_1")]
    Option1,
    #[serde(rename = "option_2")]
    Option2,
    #[serde(rename = "option_3")]
    Option3,
    #[serde(rename = "option_4")]
    Option4,
    #[serde(rename = "option_5")]
    Option5,
    #[serde(rename = "option_6")]
    Option6,
    #[serde(rename = "option_7")]
    Option7,
    #[serde(rename = "option_8")]
    Option8,
    #[serde(rename = "flap_A")]
    FlapA,
    #[serde(rename = "flap_B")]
    FlapB,
    #[serde(rename = "flap_C")]
    FlapC,
    #[serde(rename = "flap_D")]
    FlapD,
    #[serde(rename = "big_diamond")]
    BigDiamond,
}

impl SegmentId {
    /// Catalog order. Reconstruction places segments in this order.
    pub const ALL: [SegmentId; 13] = [
        SegmentId::Option1,
        SegmentId::Option2,
        SegmentId::Option3,
        SegmentId::Option4,
        SegmentId::Option5,
        SegmentId::Option6,
        SegmentId::Option7,
        SegmentId::Option8,
        SegmentId::FlapA,
        SegmentId::FlapB,
        SegmentId::FlapC,
        SegmentId::FlapD,
        SegmentId::BigDiamond,
    ];

    pub const FLAPS: [SegmentId; 4] = [
        SegmentId::FlapA,
        SegmentId::FlapB,
        SegmentId::FlapC,
        SegmentId::FlapD,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentId::Option1 => "option_1",
            SegmentId::Option2 => "option_2",
            SegmentId::Option3 => "option_3",
            SegmentId::Option4 => "option_4",
            SegmentId::Option5 => "option_5",
            SegmentId::Option6 => "option_6",
            SegmentId::Option7 => "option_7",
            SegmentId::Option8 => "option_8",
            SegmentId::FlapA => "flap_A",
            SegmentId::FlapB => "flap_B",
            SegmentId::FlapC => "flap_C",
            SegmentId::FlapD => "flap_D",
            SegmentId::BigDiamond => "big_diamond",
        }
    }

    /// Option number (1-8) to id.
    pub fn option(number: u8) -> Result<Self> {
        match number {
            1..=8 => Ok(Self::ALL[usize::from(number - 1)]),
            _ => Err(ProcessError::SegmentNotFound(format!("option_{number}"))),
        }
    }

    pub fn is_big_diamond(self) -> bool {
        self == SegmentId::BigDiamond
    }

    pub fn file_name(self) -> String {
        format!("{}.png", self.as_str())
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentId {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ProcessError::SegmentNotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompositeId {
    #[serde(rename = "combo_opt_1_6")]
    Options1And6,
    #[serde(rename = "combo_opt_2_5")]
    Options2And5,
    #[serde(rename = "combo_opt_3_8")]
    Options3And8,
    #[serde(rename = "combo_opt_4_7")]
    Options4And7,
    #[serde(rename = "combo_flaps")]
    Flaps,
    #[serde(rename = "combo_diamond")]
    Diamond,
}

impl CompositeId {
    pub const ALL: [CompositeId; 6] = [
        CompositeId::Options1And6,
        CompositeId::Options2And5,
        CompositeId::Options3And8,
        CompositeId::Options4And7,
        CompositeId::Flaps,
        CompositeId::Diamond,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompositeId::Options1And6 => "combo_opt_1_6",
            CompositeId::Options2And5 => "combo_opt_2_5",
            CompositeId::Options3And8 => "combo_opt_3_8",
            CompositeId::Options4And7 => "combo_opt_4_7",
            CompositeId::Flaps => "combo_flaps",
            CompositeId::Diamond => "combo_diamond",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.png", self.as_str())
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompositeId {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ProcessError::CompositeNotFound(s.to_string()))
    }
}

/// Which bounding-box corner of a polygon is its placement reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPoint {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDefinition {
    pub id: SegmentId,
    pub points: Vec<GridPoint>,
    pub anchor_point: AnchorPoint,
    /// Degrees, counter-clockwise, applied when placing
    pub default_rotation: f64,
    pub scale: f64,
    pub offset: (f64, f64),
}

/// Inclusive grid extents of a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl GridBounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

impl SegmentDefinition {
    pub fn bounds(&self) -> GridBounds {
        let xs = self.points.iter().map(|p| p.0);
        let ys = self.points.iter().map(|p| p.1);
        GridBounds {
            min_x: xs.clone().min().unwrap_or(0),
            max_x: xs.max().unwrap_or(0),
            min_y: ys.clone().min().unwrap_or(0),
            max_y: ys.max().unwrap_or(0),
        }
    }

    /// The polygon-extrema point selected by `anchor_point`.
    pub fn anchor_coordinates(&self) -> GridPoint {
        let b = self.bounds();
        match self.anchor_point {
            AnchorPoint::TopLeft => (b.min_x, b.min_y),
            AnchorPoint::TopRight => (b.max_x, b.min_y),
            AnchorPoint::BottomLeft => (b.min_x, b.max_y),
            AnchorPoint::BottomRight => (b.max_x, b.max_y),
        }
    }

    pub fn adjustment(&self) -> Adjustment {
        Adjustment {
            scale: self.scale,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Diagonal,
    Grid,
    Custom,
}

/// Region of a composite, normalized to `[0, 1]` as `[left, top, right, bottom]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRegion {
    pub bbox: [f64; 4],
    pub rotation: f64,
    pub segment: SegmentId,
}

impl SplitRegion {
    pub fn new(bbox: [f64; 4], segment: SegmentId) -> Self {
        Self { bbox, rotation: 0.0, segment }
    }
}

/// One side of a diagonal composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagonalHalf {
    pub segment: SegmentId,
    /// Rotation the segment receives when the composite is built
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Split {
    /// Two triangles meeting along a diagonal. After rotating the composite
    /// by `rotation` the seam is horizontal, `upper` above it and `lower`
    /// below it.
    Diagonal {
        rotation: f64,
        upper: DiagonalHalf,
        lower: DiagonalHalf,
    },
    /// Regions expected to tile the unit square.
    Grid { regions: Vec<SplitRegion> },
    Custom { regions: Vec<SplitRegion> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeDefinition {
    pub id: CompositeId,
    pub split: Split,
}

impl CompositeDefinition {
    pub fn split_type(&self) -> SplitType {
        match self.split {
            Split::Diagonal { .. } => SplitType::Diagonal,
            Split::Grid { .. } => SplitType::Grid,
            Split::Custom { .. } => SplitType::Custom,
        }
    }

    pub fn segments(&self) -> Vec<SegmentId> {
        match &self.split {
            Split::Diagonal { upper, lower, .. } => vec![upper.segment, lower.segment],
            Split::Grid { regions } | Split::Custom { regions } => {
                regions.iter().map(|r| r.segment).collect()
            }
        }
    }

    pub fn regions(&self) -> &[SplitRegion] {
        match &self.split {
            Split::Diagonal { .. } => &[],
            Split::Grid { regions } | Split::Custom { regions } => regions,
        }
    }
}

struct BaseGeometry {
    id: SegmentId,
    points: &'static [GridPoint],
    rotation: f64,
    corner: Option<Corner>,
}

// Options are numbered and flaps lettered clockwise from the top left.
#[rustfmt::skip]
const BASE_GEOMETRY: [BaseGeometry; 13] = [
    BaseGeometry { id: SegmentId::Option1, points: &[(1, 0), (1, 1), (2, 0)], rotation: 90.0, corner: Some(Corner::TopLeft) },
    BaseGeometry { id: SegmentId::Option2, points: &[(2, 0), (3, 0), (3, 1)], rotation: -90.0, corner: Some(Corner::TopRight) },
    BaseGeometry { id: SegmentId::Option3, points: &[(3, 1), (4, 1), (4, 2)], rotation: 90.0, corner: Some(Corner::TopRight) },
    BaseGeometry { id: SegmentId::Option4, points: &[(3, 3), (4, 2), (4, 3)], rotation: -180.0, corner: Some(Corner::BottomRight) },
    BaseGeometry { id: SegmentId::Option5, points: &[(2, 4), (3, 3), (3, 4)], rotation: 0.0, corner: Some(Corner::BottomRight) },
    BaseGeometry { id: SegmentId::Option6, points: &[(1, 3), (1, 4), (2, 4)], rotation: 0.0, corner: Some(Corner::BottomLeft) },
    BaseGeometry { id: SegmentId::Option7, points: &[(0, 2), (0, 3), (1, 3)], rotation: -90.0, corner: Some(Corner::BottomLeft) },
    BaseGeometry { id: SegmentId::Option8, points: &[(0, 1), (0, 2), (1, 1)], rotation: 0.0, corner: Some(Corner::TopLeft) },
    BaseGeometry { id: SegmentId::FlapA, points: &[(0, 0), (1, 0), (1, 1), (0, 1)], rotation: 0.0, corner: Some(Corner::TopLeft) },
    BaseGeometry { id: SegmentId::FlapB, points: &[(3, 0), (4, 0), (4, 1), (3, 1)], rotation: 0.0, corner: Some(Corner::TopRight) },
    BaseGeometry { id: SegmentId::FlapC, points: &[(3, 3), (4, 3), (4, 4), (3, 4)], rotation: 0.0, corner: Some(Corner::BottomRight) },
    BaseGeometry { id: SegmentId::FlapD, points: &[(0, 3), (1, 3), (1, 4), (0, 4)], rotation: 0.0, corner: Some(Corner::BottomLeft) },
    BaseGeometry { id: SegmentId::BigDiamond, points: &[(1, 1), (3, 1), (3, 3), (1, 3)], rotation: 0.0, corner: None },
];

fn diagonal(
    id: CompositeId,
    rotation: f64,
    upper: (SegmentId, f64),
    lower: (SegmentId, f64),
) -> CompositeDefinition {
    CompositeDefinition {
        id,
        split: Split::Diagonal {
            rotation,
            upper: DiagonalHalf { segment: upper.0, rotation: upper.1 },
            lower: DiagonalHalf { segment: lower.0, rotation: lower.1 },
        },
    }
}

fn composite_definitions() -> Vec<CompositeDefinition> {
    vec![
        diagonal(
            CompositeId::Options1And6,
            45.0,
            (SegmentId::Option1, -90.0),
            (SegmentId::Option6, 0.0),
        ),
        diagonal(
            CompositeId::Options2And5,
            -45.0,
            (SegmentId::Option2, 90.0),
            (SegmentId::Option5, 0.0),
        ),
        diagonal(
            CompositeId::Options3And8,
            135.0,
            (SegmentId::Option3, -90.0),
            (SegmentId::Option8, 0.0),
        ),
        diagonal(
            CompositeId::Options4And7,
            -45.0,
            (SegmentId::Option4, -180.0),
            (SegmentId::Option7, 90.0),
        ),
        CompositeDefinition {
            id: CompositeId::Flaps,
            split: Split::Grid {
                regions: vec![
                    SplitRegion::new([0.0, 0.0, 0.5, 0.5], SegmentId::FlapA),
                    SplitRegion::new([0.5, 0.0, 1.0, 0.5], SegmentId::FlapB),
                    SplitRegion::new([0.5, 0.5, 1.0, 1.0], SegmentId::FlapC),
                    SplitRegion::new([0.0, 0.5, 0.5, 1.0], SegmentId::FlapD),
                ],
            },
        },
        CompositeDefinition {
            id: CompositeId::Diamond,
            split: Split::Custom {
                regions: vec![SplitRegion::new([0.0, 0.0, 1.0, 1.0], SegmentId::BigDiamond)],
            },
        },
    ]
}

/// Corrected, immutable segment and composite tables.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    segments: Vec<SegmentDefinition>,
    composites: Vec<CompositeDefinition>,
}

impl Catalog {
    pub fn new(adjustments: &CornerAdjustments) -> Self {
        let segments = BASE_GEOMETRY
            .iter()
            .map(|base| {
                // The big diamond is never corrected.
                let adjustment = base
                    .corner
                    .map_or(Adjustment::IDENTITY, |corner| adjustments.for_corner(corner));
                SegmentDefinition {
                    id: base.id,
                    points: base.points.to_vec(),
                    anchor_point: AnchorPoint::TopLeft,
                    default_rotation: base.rotation,
                    scale: adjustment.scale,
                    offset: adjustment.offset,
                }
            })
            .collect();

        Self {
            segments,
            composites: composite_definitions(),
        }
    }

    pub fn segment(&self, id: SegmentId) -> &SegmentDefinition {
        &self.segments[id.index()]
    }

    pub fn composite(&self, id: CompositeId) -> &CompositeDefinition {
        &self.composites[id.index()]
    }

    pub fn lookup_segment(&self, id: &str) -> Result<&SegmentDefinition> {
        Ok(self.segment(id.parse()?))
    }

    pub fn lookup_composite(&self, id: &str) -> Result<&CompositeDefinition> {
        Ok(self.composite(id.parse()?))
    }

    pub fn segments(&self) -> impl Iterator<Item = &SegmentDefinition> {
        self.segments.iter()
    }

    pub fn composites(&self) -> impl Iterator<Item = &CompositeDefinition> {
        self.composites.iter()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(&CornerAdjustments::default())
    }
}
