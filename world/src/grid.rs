//! Tile matrix and the entry-to-exit route derived from it.

use ghost_defence_core::{GridLocation, TileKind};
use rand::Rng;
use thiserror::Error;

/// Share of open ground turned into decorative obstacles when decorating.
pub const DEFAULT_DECORATION_PERCENT: u32 = 7;

/// Reasons a grid description is rejected before any route is derived.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridFormatError {
    /// The input contained no header line.
    #[error("grid is missing the `rows columns` header")]
    MissingHeader,
    /// The header line could not be parsed into two positive integers.
    #[error("malformed grid header `{0}`")]
    MalformedHeader(String),
    /// Fewer rows were supplied than the header declared.
    #[error("grid declares {expected} rows but only {found} were supplied")]
    MissingRow {
        /// Row count declared by the header.
        expected: u32,
        /// Rows actually supplied.
        found: u32,
    },
    /// More rows were supplied than the header declared.
    #[error("grid declares {expected} rows but {found} were supplied")]
    ExtraRows {
        /// Row count declared by the header.
        expected: u32,
        /// Rows actually supplied.
        found: u32,
    },
    /// A row held the wrong number of tiles.
    #[error("row {row} holds {found} tiles, expected {expected}")]
    ColumnCount {
        /// Zero-based index of the offending row.
        row: u32,
        /// Column count declared by the header.
        expected: u32,
        /// Tiles actually present in the row.
        found: u32,
    },
    /// A tile token was not an integer.
    #[error("tile token `{token}` at {location} is not an integer")]
    InvalidToken {
        /// Tile holding the token.
        location: GridLocation,
        /// Offending token.
        token: String,
    },
    /// A tile code was outside the tile enumeration.
    #[error("tile code {code} at {location} is out of range")]
    UnknownTileCode {
        /// Tile holding the code.
        location: GridLocation,
        /// Offending code.
        code: u32,
    },
    /// The grid had a zero dimension.
    #[error("grid dimensions must be positive")]
    EmptyGrid,
    /// No entry tile was present.
    #[error("grid has no entry tile")]
    MissingEntry,
    /// More than one entry tile was present.
    #[error("grid has more than one entry tile ({first} and {second})")]
    MultipleEntries {
        /// First entry found in row-major order.
        first: GridLocation,
        /// Second entry found in row-major order.
        second: GridLocation,
    },
    /// No exit tile was present.
    #[error("grid has no exit tile")]
    MissingExit,
    /// More than one exit tile was present.
    #[error("grid has more than one exit tile ({first} and {second})")]
    MultipleExits {
        /// First exit found in row-major order.
        first: GridLocation,
        /// Second exit found in row-major order.
        second: GridLocation,
    },
}

/// Reasons the road network does not form a single entry-to-exit corridor.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DisconnectedGridError {
    /// The walk from the entry ran out of road before reaching the exit.
    #[error("road from the entry dead-ends at {at} before reaching the exit")]
    DeadEnd {
        /// Last tile reached by the walk.
        at: GridLocation,
    },
    /// Road tiles exist that the entry-to-exit route never visits.
    #[error("{count} road tiles lie off the entry-to-exit route, first at {first}")]
    StrayRoad {
        /// First unvisited road tile in row-major order.
        first: GridLocation,
        /// Number of unvisited road tiles.
        count: usize,
    },
}

/// Errors raised while constructing a [`GridTopology`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The grid description is malformed.
    #[error(transparent)]
    Format(#[from] GridFormatError),
    /// The road network is not a single corridor.
    #[error(transparent)]
    Disconnected(#[from] DisconnectedGridError),
}

/// Immutable tile matrix with its cached route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridTopology {
    rows: u32,
    columns: u32,
    tiles: Vec<TileKind>,
    entry: GridLocation,
    exit: GridLocation,
    route: Vec<GridLocation>,
    sequence: Vec<Option<u32>>,
}

impl GridTopology {
    /// Builds a topology from rows of tile kinds.
    ///
    /// The declared dimensions must match the supplied rows exactly.
    pub fn from_rows(rows: u32, columns: u32, tiles: Vec<Vec<TileKind>>) -> Result<Self, GridError> {
        if rows == 0 || columns == 0 {
            return Err(GridFormatError::EmptyGrid.into());
        }

        let found = u32::try_from(tiles.len()).unwrap_or(u32::MAX);
        if found < rows {
            return Err(GridFormatError::MissingRow {
                expected: rows,
                found,
            }
            .into());
        }
        if found > rows {
            return Err(GridFormatError::ExtraRows {
                expected: rows,
                found,
            }
            .into());
        }

        let mut flat = Vec::with_capacity(tiles.iter().map(Vec::len).sum());
        for (row, line) in (0_u32..).zip(tiles) {
            let width = u32::try_from(line.len()).unwrap_or(u32::MAX);
            if width != columns {
                return Err(GridFormatError::ColumnCount {
                    row,
                    expected: columns,
                    found: width,
                }
                .into());
            }
            flat.extend(line);
        }

        Self::from_flat(rows, columns, flat)
    }

    /// Builds a topology from rows of raw tile codes.
    pub fn from_codes(rows: u32, columns: u32, codes: &[Vec<u32>]) -> Result<Self, GridError> {
        let mut tiles = Vec::with_capacity(codes.len());
        for (row, line) in (0_u32..).zip(codes) {
            let mut kinds = Vec::with_capacity(line.len());
            for (column, &code) in (0_u32..).zip(line) {
                kinds.push(decode_tile(GridLocation::new(row, column), code)?);
            }
            tiles.push(kinds);
        }
        Self::from_rows(rows, columns, tiles)
    }

    /// Parses the plain-text grid format without decoration.
    ///
    /// The first non-blank line holds `rows columns`; each of the next `rows`
    /// lines holds `columns` whitespace-separated tile codes.
    pub fn parse(input: &str) -> Result<Self, GridError> {
        let (rows, columns, codes) = parse_codes(input)?;
        Self::from_codes(rows, columns, &codes)
    }

    /// Parses the plain-text grid format, turning roughly `percent` percent of
    /// open ground into decorative obstacles.
    pub fn parse_with<R: Rng + ?Sized>(
        input: &str,
        rng: &mut R,
        percent: u32,
    ) -> Result<Self, GridError> {
        let (rows, columns, codes) = parse_codes(input)?;
        let mut tiles = Vec::with_capacity(codes.len());
        for (row, line) in (0_u32..).zip(&codes) {
            let mut kinds = Vec::with_capacity(line.len());
            for (column, &code) in (0_u32..).zip(line) {
                let kind = decode_tile(GridLocation::new(row, column), code)?;
                kinds.push(decorate(kind, rng, percent));
            }
            tiles.push(kinds);
        }
        Self::from_rows(rows, columns, tiles)
    }

    fn from_flat(rows: u32, columns: u32, tiles: Vec<TileKind>) -> Result<Self, GridError> {
        let entry = unique_tile(columns, &tiles, TileKind::Entry)
            .map_err(|duplicate| match duplicate {
                None => GridFormatError::MissingEntry,
                Some((first, second)) => GridFormatError::MultipleEntries { first, second },
            })?;
        let exit = unique_tile(columns, &tiles, TileKind::Exit).map_err(|duplicate| {
            match duplicate {
                None => GridFormatError::MissingExit,
                Some((first, second)) => GridFormatError::MultipleExits { first, second },
            }
        })?;

        let (route, sequence) = trace_route(rows, columns, &tiles, entry, exit)?;

        Ok(Self {
            rows,
            columns,
            tiles,
            entry,
            exit,
            route,
            sequence,
        })
    }

    /// Number of tile rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of tile columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Tile where mobiles enter.
    #[must_use]
    pub const fn entry(&self) -> GridLocation {
        self.entry
    }

    /// Tile mobiles leave from.
    #[must_use]
    pub const fn exit(&self) -> GridLocation {
        self.exit
    }

    /// Ordered route from entry to exit, both included.
    #[must_use]
    pub fn route(&self) -> &[GridLocation] {
        &self.route
    }

    /// Position of `location` along the route, if it lies on it.
    #[must_use]
    pub fn route_index(&self, location: GridLocation) -> Option<usize> {
        let index = self.index(location)?;
        self.sequence
            .get(index)
            .copied()
            .flatten()
            .and_then(|sequence| usize::try_from(sequence).ok())
    }

    /// Kind of the tile at `location`, if it lies inside the grid.
    #[must_use]
    pub fn tile(&self, location: GridLocation) -> Option<TileKind> {
        self.index(location)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// Reports whether a defender may be built on `location`.
    ///
    /// The `is_occupied` closure should report whether a defender already
    /// stands on the tile.
    pub fn is_buildable_with<F>(&self, location: GridLocation, is_occupied: F) -> bool
    where
        F: FnOnce(GridLocation) -> bool,
    {
        self.tile(location) == Some(TileKind::OpenBuildable)
            && self.route_index(location).is_none()
            && !is_occupied(location)
    }

    fn index(&self, location: GridLocation) -> Option<usize> {
        index(self.rows, self.columns, location)
    }
}

fn index(rows: u32, columns: u32, location: GridLocation) -> Option<usize> {
    if location.row() >= rows || location.column() >= columns {
        return None;
    }
    let width = usize::try_from(columns).ok()?;
    let row = usize::try_from(location.row()).ok()?;
    let column = usize::try_from(location.column()).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

fn location_of(columns: u32, index: usize) -> GridLocation {
    let width = columns as usize;
    let row = u32::try_from(index / width).unwrap_or(u32::MAX);
    let column = u32::try_from(index % width).unwrap_or(u32::MAX);
    GridLocation::new(row, column)
}

fn unique_tile(
    columns: u32,
    tiles: &[TileKind],
    wanted: TileKind,
) -> Result<GridLocation, Option<(GridLocation, GridLocation)>> {
    let mut matches = tiles
        .iter()
        .enumerate()
        .filter(|(_, kind)| **kind == wanted)
        .map(|(index, _)| location_of(columns, index));

    let first = matches.next().ok_or(None)?;
    if let Some(second) = matches.next() {
        return Err(Some((first, second)));
    }
    Ok(first)
}

/// Walks the corridor from `entry` with an explicit worklist.
///
/// Each step takes the first unvisited traversable neighbour in the order
/// right, down, up, left and stamps it with the next sequence index.
fn trace_route(
    rows: u32,
    columns: u32,
    tiles: &[TileKind],
    entry: GridLocation,
    exit: GridLocation,
) -> Result<(Vec<GridLocation>, Vec<Option<u32>>), DisconnectedGridError> {
    let mut sequence: Vec<Option<u32>> = vec![None; tiles.len()];
    let mut route = Vec::new();
    let mut worklist = vec![entry];
    let mut next_index: u32 = 0;

    while let Some(current) = worklist.pop() {
        let Some(slot) = index(rows, columns, current) else {
            continue;
        };
        sequence[slot] = Some(next_index);
        next_index += 1;
        route.push(current);

        if current == exit {
            break;
        }

        let next = current.neighbors(rows, columns).find(|neighbor| {
            index(rows, columns, *neighbor).is_some_and(|candidate| {
                tiles[candidate].is_traversable() && sequence[candidate].is_none()
            })
        });

        match next {
            Some(neighbor) => worklist.push(neighbor),
            None => return Err(DisconnectedGridError::DeadEnd { at: current }),
        }
    }

    let mut stray = tiles
        .iter()
        .zip(&sequence)
        .enumerate()
        .filter(|(_, (kind, visited))| kind.is_traversable() && visited.is_none())
        .map(|(index, _)| location_of(columns, index));

    if let Some(first) = stray.next() {
        return Err(DisconnectedGridError::StrayRoad {
            first,
            count: 1 + stray.count(),
        });
    }

    Ok((route, sequence))
}

fn decode_tile(location: GridLocation, code: u32) -> Result<TileKind, GridFormatError> {
    u8::try_from(code)
        .ok()
        .and_then(TileKind::from_code)
        .ok_or(GridFormatError::UnknownTileCode { location, code })
}

fn decorate<R: Rng + ?Sized>(kind: TileKind, rng: &mut R, percent: u32) -> TileKind {
    if kind != TileKind::OpenBuildable || percent == 0 {
        return kind;
    }
    let roll: u32 = rng.gen_range(0..100);
    if roll >= 100_u32.saturating_sub(percent) {
        TileKind::Blocked
    } else {
        kind
    }
}

fn parse_codes(input: &str) -> Result<(u32, u32, Vec<Vec<u32>>), GridFormatError> {
    let mut lines = input.lines().filter(|line| !line.trim().is_empty());
    let header = lines.next().ok_or(GridFormatError::MissingHeader)?;
    let (rows, columns) = parse_header(header)?;

    // Sized by what is actually read; the header alone is not trusted.
    let mut codes = Vec::new();
    for row in 0..rows {
        let line = lines.next().ok_or(GridFormatError::MissingRow {
            expected: rows,
            found: row,
        })?;

        let mut values = Vec::new();
        for (column, token) in (0_u32..).zip(line.split_whitespace()) {
            let location = GridLocation::new(row, column);
            let code = token
                .parse::<u32>()
                .map_err(|_| GridFormatError::InvalidToken {
                    location,
                    token: token.to_owned(),
                })?;
            values.push(code);
        }

        let found = u32::try_from(values.len()).unwrap_or(u32::MAX);
        if found != columns {
            return Err(GridFormatError::ColumnCount {
                row,
                expected: columns,
                found,
            });
        }
        codes.push(values);
    }

    let extra = u32::try_from(lines.count()).unwrap_or(u32::MAX);
    if extra > 0 {
        return Err(GridFormatError::ExtraRows {
            expected: rows,
            found: rows.saturating_add(extra),
        });
    }

    Ok((rows, columns, codes))
}

fn parse_header(header: &str) -> Result<(u32, u32), GridFormatError> {
    let malformed = || GridFormatError::MalformedHeader(header.trim().to_owned());
    let mut tokens = header.split_whitespace();
    let rows = tokens
        .next()
        .and_then(|token| token.parse::<u32>().ok())
        .ok_or_else(malformed)?;
    let columns = tokens
        .next()
        .and_then(|token| token.parse::<u32>().ok())
        .ok_or_else(malformed)?;
    if tokens.next().is_some() {
        return Err(malformed());
    }
    if rows == 0 || columns == 0 {
        return Err(GridFormatError::EmptyGrid);
    }
    Ok((rows, columns))
}
