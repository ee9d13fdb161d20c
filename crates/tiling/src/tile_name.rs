//! Tile identifiers embedded in point-cloud file names
//!
//! File names follow `type_date_coordX_coordY_projH_projV[_suffix].ext`,
//! e.g. `Semis_2021_0770_6278_LA93_IGN69.laz`. The two coordinates are
//! 4-digit kilometric indices of the tile's upper-left corner.

use lidartile_core::{BoundingBox, Error, Result};
use std::fmt;
use std::path::Path;

/// Largest coordinate representable with 4 digits
pub const MAX_COORD: u32 = 9999;

/// Parsed tile file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileId {
    pub kind: String,
    pub date: String,
    pub coord_x: u32,
    pub coord_y: u32,
    pub proj_horiz: String,
    pub proj_vert: String,
    pub suffix: Option<String>,
    /// Extension without the dot, empty when the name has none
    pub extension: String,
}

/// Compass position of a neighbor, north being +Y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    /// Grid offset `(dx, dy)`
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::N => (0, 1),
            Direction::NE => (1, 1),
            Direction::E => (1, 0),
            Direction::SE => (1, -1),
            Direction::S => (0, -1),
            Direction::SW => (-1, -1),
            Direction::W => (-1, 0),
            Direction::NW => (-1, 1),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::N => Direction::S,
            Direction::NE => Direction::SW,
            Direction::E => Direction::W,
            Direction::SE => Direction::NW,
            Direction::S => Direction::N,
            Direction::SW => Direction::NE,
            Direction::W => Direction::E,
            Direction::NW => Direction::SE,
        }
    }
}

/// Neighbors of a tile in `Direction::ALL` order.
///
/// Positions that fall outside `0..=MAX_COORD` are left out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NeighborSet {
    entries: Vec<(Direction, TileId)>,
}

impl NeighborSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, direction: Direction) -> Option<&TileId> {
        self.entries
            .iter()
            .find(|(d, _)| *d == direction)
            .map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Direction, TileId)> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a NeighborSet {
    type Item = &'a (Direction, TileId);
    type IntoIter = std::slice::Iter<'a, (Direction, TileId)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn malformed(name: &str, reason: impl Into<String>) -> Error {
    Error::MalformedTileName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn parse_coord(name: &str, token: &str, axis: &str) -> Result<u32> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(name, format!("{axis} coordinate '{token}' is not 4 digits")));
    }
    token
        .parse()
        .map_err(|_| malformed(name, format!("{axis} coordinate '{token}' is not a number")))
}

impl TileId {
    /// Parse a tile file name. Any leading directory is ignored.
    pub fn parse(filename: impl AsRef<Path>) -> Result<Self> {
        let path = filename.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| malformed(&path.display().to_string(), "not a UTF-8 file name"))?;

        let (body, extension) = match name.rsplit_once('.') {
            Some((body, ext)) => (body, ext),
            None => (name, ""),
        };
        if name.ends_with('.') {
            return Err(malformed(name, "empty extension after '.'"));
        }
        if extension.len() > 3 || !extension.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(malformed(name, format!("bad extension '{extension}'")));
        }

        let tokens: Vec<&str> = body.split('_').collect();
        if tokens.len() != 6 && tokens.len() != 7 {
            return Err(malformed(
                name,
                format!("expected 6 or 7 '_'-separated fields, found {}", tokens.len()),
            ));
        }
        for (i, field) in [(0, "type"), (1, "date"), (4, "horizontal projection"), (5, "vertical projection")] {
            if !is_token(tokens[i]) {
                return Err(malformed(name, format!("{field} field '{}' is not alphanumeric", tokens[i])));
            }
        }
        let suffix = match tokens.get(6) {
            Some(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => Some(s.to_string()),
            Some(s) => return Err(malformed(name, format!("suffix '{s}' is not numeric"))),
            None => None,
        };

        Ok(Self {
            kind: tokens[0].to_string(),
            date: tokens[1].to_string(),
            coord_x: parse_coord(name, tokens[2], "X")?,
            coord_y: parse_coord(name, tokens[3], "Y")?,
            proj_horiz: tokens[4].to_string(),
            proj_vert: tokens[5].to_string(),
            suffix,
            extension: extension.to_string(),
        })
    }

    /// File name without extension
    pub fn stem(&self) -> String {
        let mut stem = format!(
            "{}_{}_{:04}_{:04}_{}_{}",
            self.kind, self.date, self.coord_x, self.coord_y, self.proj_horiz, self.proj_vert
        );
        if let Some(suffix) = &self.suffix {
            stem.push('_');
            stem.push_str(suffix);
        }
        stem
    }

    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.stem()
        } else {
            format!("{}.{}", self.stem(), self.extension)
        }
    }

    /// Same tile name moved by `(dx, dy)` grid cells, if still representable
    pub fn offset(&self, dx: i64, dy: i64) -> Option<TileId> {
        let shift = |c: u32, d: i64| {
            let v = i64::from(c) + d;
            (0..=i64::from(MAX_COORD)).contains(&v).then_some(v as u32)
        };
        Some(TileId {
            coord_x: shift(self.coord_x, dx)?,
            coord_y: shift(self.coord_y, dy)?,
            ..self.clone()
        })
    }

    pub fn neighbors(&self) -> NeighborSet {
        let entries = Direction::ALL
            .iter()
            .filter_map(|&d| {
                let (dx, dy) = d.offset();
                self.offset(dx, dy).map(|t| (d, t))
            })
            .collect();
        NeighborSet { entries }
    }

    /// Nominal footprint `[x0, x0 + width] x [y0 - width, y0]` with
    /// `x0 = coord_x * scale` and `y0 = coord_y * scale`
    pub fn footprint(&self, scale: f64, width: f64) -> BoundingBox {
        let x0 = f64::from(self.coord_x) * scale;
        let y0 = f64::from(self.coord_y) * scale;
        BoundingBox::new(x0, x0 + width, y0 - width, y0)
    }

    /// Raster extent of the tile: the footprint shifted by half a pixel so
    /// pixel centers land on the kilometric node grid
    pub fn raster_extent(&self, scale: f64, width: f64, pixel_size: f64) -> BoundingBox {
        let f = self.footprint(scale, width);
        let h = pixel_size / 2.0;
        BoundingBox::new(f.min_x - h, f.max_x - h, f.min_y + h, f.max_y + h)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

impl std::str::FromStr for TileId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TileId::parse(s)
    }
}
