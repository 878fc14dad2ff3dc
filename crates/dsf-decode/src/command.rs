//! Command stream parsing and interpretation.
//!
//! The `CMDS` atom is a flat sequence of one-byte opcodes with inline
//! operands. [`Command::read`] parses a single command and [`CommandState::apply`]
//! applies it, so each opcode can be exercised on its own without replaying
//! a whole stream.

use glam::DVec3;

use crate::error::{DecodeError, DecodeResult};
use crate::pool::{CoordinatePool, GeoData};
use crate::reader::ByteReader;
use crate::scene::ReadOptions;
use crate::strings::Definitions;
use crate::{
    ElevationMode, LodRange, NetworkChain, PatchFlags, Placement, Polygon, TerrainPatch, Winding,
};

const COMMENT_FILTER: u16 = 1;
const COMMENT_AGL: u16 = 2;

/// How the points of a patch primitive are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointRefs {
    /// Indices into the current pool.
    Indices(Vec<u16>),
    /// Explicit `(pool, index)` pairs.
    CrossPool(Vec<(u16, u16)>),
    /// The half-open range `[first, last)` of the current pool.
    Range { first: u16, last: u16 },
}

/// Topology of a patch primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveShape {
    Triangles,
    Strip,
    Fan,
}

/// A parsed command with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PoolSelect(u16),
    JunctionOffset(u32),
    SetDefinition(u32),
    RoadSubtype(u8),
    Object(u16),
    ObjectRange {
        first: u16,
        last: u16,
    },
    NetworkChain(Vec<u16>),
    NetworkChainRange {
        first: u16,
        last: u16,
    },
    NetworkChain32(Vec<u32>),
    Polygon {
        param: u16,
        windings: Vec<PointRefs>,
    },
    /// Opcodes 16, 17 and 18. Absent operands keep the previous value.
    BeginPatch {
        flags: Option<u8>,
        lod: Option<LodRange>,
    },
    Primitive {
        shape: PrimitiveShape,
        points: PointRefs,
    },
    /// Filter selection embedded in a comment.
    Filter(i32),
    /// AGL/MSL preference embedded in a comment.
    ObjectElevation(ElevationMode),
    /// Any other comment; payload discarded.
    Comment(usize),
}

fn read_indices(reader: &mut ByteReader<'_>, count: usize) -> DecodeResult<Vec<u16>> {
    (0..count).map(|_| reader.read_u16()).collect()
}

fn read_short_indices(reader: &mut ByteReader<'_>) -> DecodeResult<Vec<u16>> {
    let count = usize::from(reader.read_u8()?);
    read_indices(reader, count)
}

fn read_cross_pool(reader: &mut ByteReader<'_>) -> DecodeResult<Vec<(u16, u16)>> {
    let count = usize::from(reader.read_u8()?);
    (0..count)
        .map(|_| Ok((reader.read_u16()?, reader.read_u16()?)))
        .collect()
}

fn read_range(reader: &mut ByteReader<'_>) -> DecodeResult<(u16, u16)> {
    Ok((reader.read_u16()?, reader.read_u16()?))
}

fn read_comment(reader: &mut ByteReader<'_>, len: usize) -> DecodeResult<Command> {
    let payload = reader.bytes(len)?;
    if len == 6 {
        let kind = u16::from_le_bytes([payload[0], payload[1]]);
        let value = i32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
        match kind {
            COMMENT_FILTER => return Ok(Command::Filter(value)),
            COMMENT_AGL => {
                let mode = if value == 0 {
                    ElevationMode::Msl
                } else {
                    ElevationMode::Agl
                };
                return Ok(Command::ObjectElevation(mode));
            }
            _ => {}
        }
    }
    Ok(Command::Comment(len))
}

fn primitive(shape: PrimitiveShape, points: PointRefs) -> Command {
    Command::Primitive { shape, points }
}

impl Command {
    /// Reads one command. Every operand byte is consumed, including the
    /// payloads of commands the interpreter later ignores.
    pub fn read(reader: &mut ByteReader<'_>) -> DecodeResult<Self> {
        let offset = reader.absolute_position();
        let opcode = reader.read_u8()?;
        let command = match opcode {
            1 => Self::PoolSelect(reader.read_u16()?),
            2 => Self::JunctionOffset(reader.read_u32()?),
            3 => Self::SetDefinition(u32::from(reader.read_u8()?)),
            4 => Self::SetDefinition(u32::from(reader.read_u16()?)),
            5 => Self::SetDefinition(reader.read_u32()?),
            6 => Self::RoadSubtype(reader.read_u8()?),
            7 => Self::Object(reader.read_u16()?),
            8 => {
                let (first, last) = read_range(reader)?;
                Self::ObjectRange { first, last }
            }
            9 => Self::NetworkChain(read_short_indices(reader)?),
            10 => {
                let (first, last) = read_range(reader)?;
                Self::NetworkChainRange { first, last }
            }
            11 => {
                let count = usize::from(reader.read_u8()?);
                let indices = (0..count)
                    .map(|_| reader.read_u32())
                    .collect::<DecodeResult<_>>()?;
                Self::NetworkChain32(indices)
            }
            12 => {
                let param = reader.read_u16()?;
                let winding = PointRefs::Indices(read_short_indices(reader)?);
                Self::Polygon {
                    param,
                    windings: vec![winding],
                }
            }
            13 => {
                let param = reader.read_u16()?;
                let (first, last) = read_range(reader)?;
                Self::Polygon {
                    param,
                    windings: vec![PointRefs::Range { first, last }],
                }
            }
            14 => {
                let param = reader.read_u16()?;
                let count = reader.read_u8()?;
                let windings = (0..count)
                    .map(|_| read_short_indices(reader).map(PointRefs::Indices))
                    .collect::<DecodeResult<_>>()?;
                Self::Polygon { param, windings }
            }
            15 => {
                // `count` windings delimited by `count + 1` boundaries.
                let param = reader.read_u16()?;
                let count = usize::from(reader.read_u8()?);
                let bounds = read_indices(reader, count + 1)?;
                let windings = bounds
                    .windows(2)
                    .map(|w| PointRefs::Range {
                        first: w[0],
                        last: w[1],
                    })
                    .collect();
                Self::Polygon { param, windings }
            }
            16 => Self::BeginPatch {
                flags: None,
                lod: None,
            },
            17 => Self::BeginPatch {
                flags: Some(reader.read_u8()?),
                lod: None,
            },
            18 => {
                let flags = reader.read_u8()?;
                let near = reader.read_f32()?;
                let far = reader.read_f32()?;
                Self::BeginPatch {
                    flags: Some(flags),
                    lod: Some(LodRange { near, far }),
                }
            }
            23 => primitive(PrimitiveShape::Triangles, PointRefs::Indices(read_short_indices(reader)?)),
            24 => primitive(PrimitiveShape::Triangles, PointRefs::CrossPool(read_cross_pool(reader)?)),
            25 => {
                let (first, last) = read_range(reader)?;
                primitive(PrimitiveShape::Triangles, PointRefs::Range { first, last })
            }
            26 => primitive(PrimitiveShape::Strip, PointRefs::Indices(read_short_indices(reader)?)),
            27 => primitive(PrimitiveShape::Strip, PointRefs::CrossPool(read_cross_pool(reader)?)),
            28 => {
                let (first, last) = read_range(reader)?;
                primitive(PrimitiveShape::Strip, PointRefs::Range { first, last })
            }
            29 => primitive(PrimitiveShape::Fan, PointRefs::Indices(read_short_indices(reader)?)),
            30 => primitive(PrimitiveShape::Fan, PointRefs::CrossPool(read_cross_pool(reader)?)),
            31 => {
                let (first, last) = read_range(reader)?;
                primitive(PrimitiveShape::Fan, PointRefs::Range { first, last })
            }
            32 => {
                let len = usize::from(reader.read_u8()?);
                read_comment(reader, len)?
            }
            33 => {
                let len = usize::from(reader.read_u16()?);
                read_comment(reader, len)?
            }
            34 => {
                let len = reader.read_u32()? as usize;
                read_comment(reader, len)?
            }
            opcode => return Err(DecodeError::UnrecognizedCommand { opcode, offset }),
        };
        Ok(command)
    }
}

/// Expands a triangle fan: `(p0, pi, pi+1)` for `i` in `1..=n-2`.
#[must_use]
pub fn fan_to_triangles<T: Copy>(points: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(points.len().saturating_sub(2) * 3);
    if let Some((&first, rest)) = points.split_first() {
        for pair in rest.windows(2) {
            out.extend([first, pair[0], pair[1]]);
        }
    }
    out
}

/// Expands a triangle strip, flipping every other triangle to keep winding.
#[must_use]
pub fn strip_to_triangles<T: Copy>(points: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(points.len().saturating_sub(2) * 3);
    for (i, w) in points.windows(3).enumerate() {
        if i % 2 == 0 {
            out.extend([w[0], w[1], w[2]]);
        } else {
            out.extend([w[1], w[0], w[2]]);
        }
    }
    out
}

/// Everything the interpreter reads but never mutates.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub geo: &'a GeoData,
    pub definitions: &'a Definitions,
    pub options: &'a ReadOptions,
}

/// Everything the interpreter emits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub placements: Vec<Placement>,
    pub patches: Vec<TerrainPatch>,
    pub polygons: Vec<Polygon>,
    pub networks: Vec<NetworkChain>,
}

/// Interpreter state threaded through each command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandState {
    pub pool: Option<usize>,
    pub definition: u32,
    pub junction_offset: u32,
    pub road_subtype: u8,
    pub patch_flags: PatchFlags,
    pub lod: LodRange,
    pub object_elevation: ElevationMode,
    /// Airport filter copied onto every placement, polygon and chain; a
    /// negative filter comment clears it.
    pub filter: Option<i32>,
    /// The patch currently accumulating points, if one is open.
    pub patch: Option<TerrainPatch>,
}

impl Default for CommandState {
    fn default() -> Self {
        Self {
            pool: None,
            definition: 0,
            junction_offset: 0,
            road_subtype: 0,
            patch_flags: PatchFlags::PHYSICAL,
            lod: LodRange::default(),
            object_elevation: ElevationMode::Msl,
            filter: None,
            patch: None,
        }
    }
}

fn point_of(pools: &[CoordinatePool], pool: usize, index: usize) -> DecodeResult<&[f64]> {
    let p = pools.get(pool).ok_or(DecodeError::InvalidPool {
        index: pool,
        count: pools.len(),
    })?;
    p.point(index).ok_or(DecodeError::InvalidPoint {
        pool,
        index,
        count: p.len(),
    })
}

fn patch_vertex(values: &[f64]) -> DVec3 {
    let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
    DVec3::new(at(0), at(1), at(2))
}

impl CommandState {
    fn current_pool(&self) -> DecodeResult<usize> {
        self.pool.ok_or(DecodeError::NoPoolSelected)
    }

    /// Resolves point references against the 16-bit pools.
    fn resolve<'g>(&self, geo: &'g GeoData, refs: &PointRefs) -> DecodeResult<Vec<&'g [f64]>> {
        match refs {
            PointRefs::Indices(indices) => {
                let pool = self.current_pool()?;
                indices
                    .iter()
                    .map(|&i| point_of(&geo.pools, pool, usize::from(i)))
                    .collect()
            }
            PointRefs::CrossPool(pairs) => pairs
                .iter()
                .map(|&(p, i)| point_of(&geo.pools, usize::from(p), usize::from(i)))
                .collect(),
            PointRefs::Range { first, last } => {
                let pool = self.current_pool()?;
                (usize::from(*first)..usize::from(*last))
                    .map(|i| point_of(&geo.pools, pool, i))
                    .collect()
            }
        }
    }

    fn close_patch(&mut self, out: &mut Output) {
        if let Some(patch) = self.patch.take() {
            if patch.points.is_empty() {
                tracing::trace!(terrain = patch.terrain, "dropping empty patch");
            } else {
                out.patches.push(patch);
            }
        }
    }

    /// Applies one command, returning the successor state.
    pub fn apply(mut self, command: &Command, ctx: &Context<'_>, out: &mut Output) -> DecodeResult<Self> {
        match command {
            Command::PoolSelect(pool) => {
                let pool = usize::from(*pool);
                if pool >= ctx.geo.pools.len() && pool >= ctx.geo.pools32.len() {
                    return Err(DecodeError::InvalidPool {
                        index: pool,
                        count: ctx.geo.pools.len().max(ctx.geo.pools32.len()),
                    });
                }
                self.pool = Some(pool);
            }
            Command::JunctionOffset(offset) => self.junction_offset = *offset,
            Command::SetDefinition(def) => self.definition = *def,
            Command::RoadSubtype(subtype) => self.road_subtype = *subtype,
            Command::Object(index) => {
                if ctx.options.objects {
                    self.place(ctx, out, usize::from(*index)..usize::from(*index) + 1)?;
                }
            }
            Command::ObjectRange { first, last } => {
                if ctx.options.objects {
                    self.place(ctx, out, usize::from(*first)..usize::from(*last))?;
                }
            }
            Command::NetworkChain(indices) => {
                let offset = self.junction_offset as usize;
                let indices: Vec<usize> = indices.iter().map(|&i| usize::from(i) + offset).collect();
                self.chain(ctx, out, &indices)?;
            }
            Command::NetworkChainRange { first, last } => {
                let offset = self.junction_offset as usize;
                let indices: Vec<usize> =
                    (usize::from(*first) + offset..usize::from(*last) + offset).collect();
                self.chain(ctx, out, &indices)?;
            }
            Command::NetworkChain32(indices) => {
                let indices: Vec<usize> = indices.iter().map(|&i| i as usize).collect();
                self.chain(ctx, out, &indices)?;
            }
            Command::Polygon { param, windings } => {
                if ctx.options.polygons {
                    Definitions::lookup("polygon", &ctx.definitions.polygons, self.definition)?;
                    let windings = windings
                        .iter()
                        .map(|refs| {
                            let points = self.resolve(ctx.geo, refs)?;
                            Ok(Winding::from_points(&points))
                        })
                        .collect::<DecodeResult<_>>()?;
                    out.polygons.push(Polygon {
                        definition: self.definition,
                        param: *param,
                        windings,
                        filter: self.filter,
                    });
                }
            }
            Command::BeginPatch { flags, lod } => {
                if let Some(flags) = flags {
                    self.patch_flags = PatchFlags(*flags);
                }
                if let Some(lod) = lod {
                    self.lod = *lod;
                }
                self.close_patch(out);
                if ctx.options.terrain {
                    Definitions::lookup("terrain", &ctx.definitions.terrain, self.definition)?;
                }
                self.patch = Some(TerrainPatch {
                    terrain: self.definition,
                    flags: self.patch_flags,
                    lod: self.lod,
                    points: Vec::new(),
                });
            }
            Command::Primitive { shape, points } => self.primitive(ctx, *shape, points)?,
            Command::Filter(filter) => self.filter = (*filter >= 0).then_some(*filter),
            Command::ObjectElevation(mode) => self.object_elevation = *mode,
            Command::Comment(len) => tracing::trace!(len, "skipping comment"),
        }
        Ok(self)
    }

    /// Flushes any open patch at the end of the stream.
    pub fn finish(mut self, out: &mut Output) {
        self.close_patch(out);
    }

    fn place(
        &self,
        ctx: &Context<'_>,
        out: &mut Output,
        indices: std::ops::Range<usize>,
    ) -> DecodeResult<()> {
        Definitions::lookup("object", &ctx.definitions.objects, self.definition)?;
        let pool = self.current_pool()?;
        for index in indices {
            let values = point_of(&ctx.geo.pools, pool, index)?;
            let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
            let elevation = if values.len() == 4 {
                self.object_elevation
            } else {
                ElevationMode::Draped
            };
            out.placements.push(Placement {
                definition: self.definition,
                lon: at(0),
                lat: at(1),
                heading: at(2),
                extra: values.get(3..).map(<[f64]>::to_vec).unwrap_or_default(),
                elevation,
                filter: self.filter,
            });
        }
        Ok(())
    }

    fn chain(&self, ctx: &Context<'_>, out: &mut Output, indices: &[usize]) -> DecodeResult<()> {
        if !ctx.options.networks {
            return Ok(());
        }
        Definitions::lookup("network", &ctx.definitions.networks, self.definition)?;
        let pool = self.current_pool()?;
        let points = indices
            .iter()
            .map(|&i| point_of(&ctx.geo.pools32, pool, i))
            .collect::<DecodeResult<Vec<_>>>()?;
        out.networks.push(NetworkChain {
            definition: self.definition,
            subtype: self.road_subtype,
            points: Winding::from_points(&points),
            filter: self.filter,
        });
        Ok(())
    }

    fn primitive(
        &mut self,
        ctx: &Context<'_>,
        shape: PrimitiveShape,
        refs: &PointRefs,
    ) -> DecodeResult<()> {
        if !ctx.options.terrain {
            return Ok(());
        }
        let Some(patch) = self.patch.as_ref() else {
            tracing::trace!("patch primitive outside a patch");
            return Ok(());
        };
        // Decorative patches never contribute mesh triangles.
        if !patch.flags.is_physical() {
            return Ok(());
        }
        let vertices: Vec<DVec3> = self
            .resolve(ctx.geo, refs)?
            .into_iter()
            .map(patch_vertex)
            .collect();
        let triangles = match shape {
            PrimitiveShape::Triangles => {
                let whole = vertices.len() - vertices.len() % 3;
                vertices[..whole].to_vec()
            }
            PrimitiveShape::Strip => strip_to_triangles(&vertices),
            PrimitiveShape::Fan => fan_to_triangles(&vertices),
        };
        if let Some(patch) = self.patch.as_mut() {
            patch.points.extend(triangles);
        }
        Ok(())
    }
}

/// Runs the whole command stream of a `CMDS` payload.
pub fn interpret(reader: &mut ByteReader<'_>, ctx: &Context<'_>) -> DecodeResult<Output> {
    let mut out = Output::default();
    let mut state = CommandState::default();
    let mut count = 0usize;
    while !reader.is_empty() {
        let command = Command::read(reader)?;
        state = state.apply(&command, ctx, &mut out)?;
        count += 1;
    }
    state.finish(&mut out);
    tracing::debug!(
        commands = count,
        placements = out.placements.len(),
        patches = out.patches.len(),
        polygons = out.polygons.len(),
        networks = out.networks.len(),
        "interpreted command stream"
    );
    Ok(out)
}
