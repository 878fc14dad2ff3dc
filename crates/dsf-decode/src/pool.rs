//! Coordinate pool unpacking.
//!
//! A pool is `u32` point count, `u8` plane count, then each plane as a `u8`
//! encoding selector followed by its values. Values are 16-bit in `POOL`
//! atoms and 32-bit in `PO32` atoms. A matching `SCAL`/`SC32` atom holds one
//! `(f32 scale, f32 offset)` pair per plane.

use crate::atom::{Atom, AtomTag};
use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// Per-plane value encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneEncoding {
    /// `n` raw values.
    Raw,
    /// `n` values, each added to the previous (wrapping).
    Delta,
    /// Run-length records of raw values.
    RunLength,
    /// Run-length records whose decoded values are then delta-accumulated.
    RunLengthDelta,
}

impl PlaneEncoding {
    pub fn from_selector(selector: u8, plane: usize) -> DecodeResult<Self> {
        match selector {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Delta),
            2 => Ok(Self::RunLength),
            3 => Ok(Self::RunLengthDelta),
            encoding => Err(DecodeError::UnknownPlaneEncoding { encoding, plane }),
        }
    }

    fn is_delta(self) -> bool {
        matches!(self, Self::Delta | Self::RunLengthDelta)
    }

    fn is_run_length(self) -> bool {
        matches!(self, Self::RunLength | Self::RunLengthDelta)
    }
}

/// Width of the quantized values in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWidth {
    U16,
    U32,
}

impl ValueWidth {
    fn read(self, reader: &mut ByteReader<'_>) -> DecodeResult<u32> {
        match self {
            Self::U16 => reader.read_u16().map(u32::from),
            Self::U32 => reader.read_u32(),
        }
    }

    fn bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    fn wrapping_add(self, a: u32, b: u32) -> u32 {
        match self {
            Self::U16 => u32::from((a as u16).wrapping_add(b as u16)),
            Self::U32 => a.wrapping_add(b),
        }
    }

    /// The quantization denominator: 65535 or 2^32 - 1.
    #[must_use]
    pub fn max(self) -> f64 {
        match self {
            Self::U16 => f64::from(u16::MAX),
            Self::U32 => f64::from(u32::MAX),
        }
    }
}

/// Decodes one plane of `n` quantized values.
///
/// `n` comes from the file, so it is checked against the bytes left before
/// anything is allocated.
pub fn decode_plane(
    reader: &mut ByteReader<'_>,
    n: usize,
    encoding: PlaneEncoding,
    width: ValueWidth,
) -> DecodeResult<Vec<u32>> {
    let capacity = if encoding.is_run_length() {
        // A repeat record expands, so only the lower bound is known.
        n.min(reader.remaining())
    } else {
        let needed = n.saturating_mul(width.bytes());
        if needed > reader.remaining() {
            return Err(DecodeError::UnexpectedEof {
                offset: reader.absolute_position(),
                needed,
                available: reader.remaining(),
            });
        }
        n
    };
    let mut values = Vec::with_capacity(capacity);
    if encoding.is_run_length() {
        while values.len() < n {
            let header = reader.read_u8()?;
            let count = usize::from(header & 0x7f);
            if values.len() + count > n {
                return Err(DecodeError::RunOverflow {
                    produced: values.len() + count,
                    expected: n,
                });
            }
            if header & 0x80 != 0 {
                let v = width.read(reader)?;
                values.extend(std::iter::repeat_n(v, count));
            } else {
                for _ in 0..count {
                    values.push(width.read(reader)?);
                }
            }
        }
    } else {
        for _ in 0..n {
            values.push(width.read(reader)?);
        }
    }

    if encoding.is_delta() {
        let mut last = 0;
        for v in &mut values {
            last = width.wrapping_add(last, *v);
            *v = last;
        }
    }
    Ok(values)
}

/// Maps a quantized plane value to a real value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneScale {
    pub scale: f64,
    pub offset: f64,
}

impl PlaneScale {
    /// `offset + raw * scale / max`; a zero scale leaves the raw value as is.
    #[must_use]
    pub fn apply(&self, raw: u32, width: ValueWidth) -> f64 {
        let raw = f64::from(raw);
        if self.scale == 0.0 {
            raw
        } else {
            self.offset + raw * (self.scale / width.max())
        }
    }
}

/// Reads a `SCAL`/`SC32` payload.
pub fn read_scale_table(atom: &Atom<'_>) -> DecodeResult<Vec<PlaneScale>> {
    if atom.payload.len() % 8 != 0 {
        return Err(DecodeError::RaggedScaleTable(atom.payload.len()));
    }
    let mut reader = atom.reader();
    let mut out = Vec::with_capacity(atom.payload.len() / 8);
    while !reader.is_empty() {
        let scale = f64::from(reader.read_f32()?);
        let offset = f64::from(reader.read_f32()?);
        out.push(PlaneScale { scale, offset });
    }
    Ok(out)
}

/// A pool as stored: plane-major quantized values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPool {
    pub points: usize,
    pub planes: Vec<Vec<u32>>,
}

/// Reads a `POOL`/`PO32` payload without rescaling.
pub fn read_raw_pool(reader: &mut ByteReader<'_>, width: ValueWidth) -> DecodeResult<RawPool> {
    let points = reader.read_u32()? as usize;
    let plane_count = usize::from(reader.read_u8()?);
    let mut planes = Vec::with_capacity(plane_count);
    for plane in 0..plane_count {
        let encoding = PlaneEncoding::from_selector(reader.read_u8()?, plane)?;
        planes.push(decode_plane(reader, points, encoding, width)?);
    }
    Ok(RawPool { points, planes })
}

/// A decoded pool in point-major order: all planes of a point are adjacent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatePool {
    planes: usize,
    data: Vec<f64>,
}

impl CoordinatePool {
    /// Rescales and transposes a raw pool.
    pub fn from_raw(raw: &RawPool, scales: &[PlaneScale], width: ValueWidth) -> DecodeResult<Self> {
        let planes = raw.planes.len();
        if planes != scales.len() {
            return Err(DecodeError::PlaneCountMismatch {
                planes,
                scales: scales.len(),
            });
        }
        if let Some((plane, values)) = raw.planes.iter().enumerate().find(|(_, v)| v.len() != raw.points) {
            return Err(DecodeError::PlaneLength {
                plane,
                len: values.len(),
                points: raw.points,
            });
        }
        let mut data = vec![0.0; raw.points * planes];
        for (p, (values, scale)) in raw.planes.iter().zip(scales).enumerate() {
            for (i, &v) in values.iter().enumerate() {
                data[i * planes + p] = scale.apply(v, width);
            }
        }
        Ok(Self { planes, data })
    }

    /// Builds a pool directly from point-major values.
    #[must_use]
    pub fn from_points(planes: usize, data: Vec<f64>) -> Self {
        debug_assert!(planes == 0 || data.len() % planes == 0);
        Self { planes, data }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.planes == 0 { 0 } else { self.data.len() / self.planes }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes
    }

    /// All plane values of point `i`.
    #[must_use]
    pub fn point(&self, i: usize) -> Option<&[f64]> {
        let start = i.checked_mul(self.planes)?;
        self.data.get(start..start + self.planes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.planes.max(1))
    }
}

/// All pools from a `GEOD` group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoData {
    /// 16-bit pools, used by objects, polygons and the terrain mesh.
    pub pools: Vec<CoordinatePool>,
    /// 32-bit pools, used by networks.
    pub pools32: Vec<CoordinatePool>,
}

impl GeoData {
    pub fn from_group(group: &Atom<'_>) -> DecodeResult<Self> {
        let mut raw16 = Vec::new();
        let mut raw32 = Vec::new();
        let mut scales16 = Vec::new();
        let mut scales32 = Vec::new();
        for child in group.children() {
            let child = child?;
            match child.tag {
                AtomTag::POOL => raw16.push(read_raw_pool(&mut child.reader(), ValueWidth::U16)?),
                AtomTag::PO32 => raw32.push(read_raw_pool(&mut child.reader(), ValueWidth::U32)?),
                AtomTag::SCAL => scales16.push(read_scale_table(&child)?),
                AtomTag::SC32 => scales32.push(read_scale_table(&child)?),
                other => tracing::trace!(tag = %other, "skipping unknown geodata atom"),
            }
        }
        Ok(Self {
            pools: Self::pair(&raw16, &scales16, ValueWidth::U16)?,
            pools32: Self::pair(&raw32, &scales32, ValueWidth::U32)?,
        })
    }

    fn pair(
        raw: &[RawPool],
        scales: &[Vec<PlaneScale>],
        width: ValueWidth,
    ) -> DecodeResult<Vec<CoordinatePool>> {
        if raw.len() != scales.len() {
            return Err(DecodeError::PoolCountMismatch {
                pools: raw.len(),
                scales: scales.len(),
            });
        }
        raw.iter()
            .zip(scales)
            .enumerate()
            .map(|(i, (r, s))| {
                let pool = CoordinatePool::from_raw(r, s, width)?;
                tracing::debug!(
                    pool = i,
                    ?width,
                    points = pool.len(),
                    planes = pool.plane_count(),
                    "decoded coordinate pool"
                );
                Ok(pool)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{atom, encode_plane, pool, raw_pool, scale_table};
    use proptest::prelude::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    fn decode16(bytes: &[u8]) -> DecodeResult<RawPool> {
        read_raw_pool(&mut ByteReader::new(bytes), ValueWidth::U16)
    }

    #[test]
    fn raw_and_delta_planes() {
        let bytes = pool(3, &[
            vec![0, 1, 0, 2, 0, 3, 0],
            vec![1, 10, 0, 0xff, 0xff, 2, 0],
        ]);
        let raw = decode16(&bytes).unwrap();
        assert_eq!(raw.points, 3);
        assert_eq!(raw.planes[0], [1, 2, 3]);
        // 10, 10 + 65535 wraps to 9, then 11.
        assert_eq!(raw.planes[1], [10, 9, 11]);
    }

    #[test]
    fn run_length_records() {
        // Two literals, then 42 repeated three times, then one literal.
        let plane = vec![2, 2, 0, 0, 1, 0x83, 42, 0, 1, 0xff, 0xff];
        let raw = decode16(&pool(6, &[plane])).unwrap();
        assert_eq!(raw.planes[0], [0, 256, 42, 42, 42, u32::from(u16::MAX)]);
    }

    #[test]
    fn run_length_delta_accumulates() {
        let plane = vec![3, 0x83, 5, 0, 1, 100, 0];
        let raw = decode16(&pool(4, &[plane])).unwrap();
        assert_eq!(raw.planes[0], [5, 10, 15, 115]);
    }

    #[test]
    fn run_overflow_is_rejected() {
        let plane = vec![2, 0x85, 1, 0];
        assert!(matches!(
            decode16(&pool(3, &[plane])),
            Err(DecodeError::RunOverflow { produced: 5, expected: 3 })
        ));
    }

    #[test]
    fn unknown_encoding_is_fatal() {
        let plane = vec![7, 0, 0];
        assert!(matches!(
            decode16(&pool(1, &[plane])),
            Err(DecodeError::UnknownPlaneEncoding { encoding: 7, plane: 0 })
        ));
    }

    #[test]
    fn oversized_point_count_is_an_error() {
        // u32::MAX points announced, one raw plane, no values.
        let err = decode16(&[0xff, 0xff, 0xff, 0xff, 1, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { available: 0, .. }), "{err:?}");
        assert_eq!(err.kind(), crate::ErrorKind::Format);

        let err = decode16(&[0xff, 0xff, 0xff, 0xff, 1, 1, 5, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }), "{err:?}");

        // Run-length planes run out of records instead.
        let err = decode16(&[0xff, 0xff, 0xff, 0xff, 1, 2, 0x85, 1, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }), "{err:?}");
    }

    #[test]
    fn hand_built_pools_must_match_their_point_count() {
        let raw = RawPool {
            points: usize::MAX,
            planes: vec![vec![1, 2]],
        };
        let err = CoordinatePool::from_raw(&raw, &[PlaneScale { scale: 1.0, offset: 0.0 }], ValueWidth::U16)
            .unwrap_err();
        assert!(matches!(err, DecodeError::PlaneLength { plane: 0, len: 2, .. }));
    }

    #[test]
    fn empty_pool_decodes_to_no_points() {
        let raw = decode16(&pool(0, &[vec![0], vec![2]])).unwrap();
        let scales = [PlaneScale { scale: 1.0, offset: 0.0 }; 2];
        let decoded = CoordinatePool::from_raw(&raw, &scales, ValueWidth::U16).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.plane_count(), 2);
        assert_eq!(decoded.iter().count(), 0);
        assert!(decoded.point(0).is_none());
    }

    #[test]
    fn rescale_and_transpose() {
        // 65535 = 255 * 257, so 257 * 255 / 65535 == 1.
        let raw = decode16(&raw_pool(&[&[0, 257, 65535], &[0, 0, 65535]])).unwrap();
        let scales = [
            PlaneScale { scale: 255.0, offset: -1.0 },
            PlaneScale { scale: 2.0, offset: 50.0 },
        ];
        let decoded = CoordinatePool::from_raw(&raw, &scales, ValueWidth::U16).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_close(decoded.point(0).unwrap(), &[-1.0, 50.0]);
        assert_close(decoded.point(1).unwrap(), &[0.0, 50.0]);
        assert_close(decoded.point(2).unwrap(), &[254.0, 52.0]);
    }

    #[test]
    fn zero_scale_keeps_raw_value() {
        let s = PlaneScale { scale: 0.0, offset: 10.0 };
        assert_eq!(s.apply(7, ValueWidth::U16), 7.0);
    }

    #[test]
    fn plane_and_scale_counts_must_agree() {
        let raw = decode16(&raw_pool(&[&[1], &[2]])).unwrap();
        let err = CoordinatePool::from_raw(&raw, &[PlaneScale { scale: 1.0, offset: 0.0 }], ValueWidth::U16)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PoolConsistency);
    }

    #[test]
    fn geodata_pairs_pools_with_scales() {
        let inner = [
            atom(AtomTag::POOL, &raw_pool(&[&[0, 65535]])),
            atom(AtomTag::SCAL, &scale_table(&[(1.0, 0.0)])),
        ]
        .concat();
        let group = atom(AtomTag::GEOD, &inner);
        let parsed = crate::atom::Atoms::new(ByteReader::new(&group)).next().unwrap().unwrap();
        let geo = GeoData::from_group(&parsed).unwrap();
        assert_eq!(geo.pools.len(), 1);
        assert_close(geo.pools[0].point(1).unwrap(), &[1.0]);
        assert!(geo.pools32.is_empty());
    }

    #[test]
    fn geodata_rejects_missing_scale_table() {
        let group = atom(AtomTag::GEOD, &atom(AtomTag::POOL, &raw_pool(&[&[1]])));
        let parsed = crate::atom::Atoms::new(ByteReader::new(&group)).next().unwrap().unwrap();
        let err = GeoData::from_group(&parsed).unwrap_err();
        assert!(matches!(err, DecodeError::PoolCountMismatch { pools: 1, scales: 0 }));
        assert_eq!(err.kind(), crate::ErrorKind::PoolConsistency);
    }

    #[test]
    fn thirty_two_bit_pools() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend([1, 1]);
        bytes.extend(u32::MAX.to_le_bytes());
        bytes.extend(2u32.to_le_bytes());
        let raw = read_raw_pool(&mut ByteReader::new(&bytes), ValueWidth::U32).unwrap();
        // u32::MAX + 2 wraps to 1.
        assert_eq!(raw.planes[0], [u32::MAX, 1]);
    }

    proptest! {
        #[test]
        fn all_encodings_agree(values in proptest::collection::vec(any::<u16>(), 0..400)) {
            let decoded: Vec<Vec<u32>> = (0..4u8)
                .map(|e| {
                    let bytes = pool(values.len(), &[encode_plane(&values, e)]);
                    decode16(&bytes).unwrap().planes.remove(0)
                })
                .collect();
            let expected: Vec<u32> = values.iter().copied().map(u32::from).collect();
            for plane in &decoded {
                prop_assert_eq!(plane, &expected);
            }
        }

        #[test]
        fn repeated_values_agree(value in any::<u16>(), n in 0usize..300) {
            let values = vec![value; n];
            let rle = decode16(&pool(n, &[encode_plane(&values, 2)])).unwrap();
            let raw = decode16(&pool(n, &[encode_plane(&values, 0)])).unwrap();
            prop_assert_eq!(rle, raw);
        }
    }
}
