mod nurbs;
mod units;

pub use nurbs::{NurbsCurve, NurbsError};
pub use units::{UnitConversion, Units};

use std::f64::consts::PI;

use sheetnest_core::{geometry::Point2, record::EntityRecord, shape::ShapeGeometry};
use thiserror::Error;
use tracing::debug;

/// 单个圆弧或样条允许的最大采样段数，超出视为数据错误。
pub const MAX_SEGMENTS: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum TessellateError {
    #[error("unsupported geometry: entity {kind}")]
    UnsupportedEntity { kind: String },
    #[error("实体记录缺少类型（组码 0）")]
    MissingKind,
    #[error("{kind} 缺少组码 {code}")]
    MissingField { kind: String, code: i32 },
    #[error("{kind} 组码 {code} 解析失败（值：\"{value}\"）")]
    InvalidNumber {
        kind: String,
        code: i32,
        value: String,
    },
    #[error("{kind} 数据无效：{message}")]
    Invalid { kind: String, message: String },
    #[error("SPLINE 无效：{0}")]
    Spline(#[from] NurbsError),
    #[error("POLYLINE 序列缺少 SEQEND 终止标记（已累积 {0} 个顶点）")]
    UnterminatedPolyline(usize),
}

/// 正在累积的 POLYLINE/VERTEX 序列。
#[derive(Debug, Default)]
struct PendingPolyline {
    points: Vec<Point2>,
    closed: bool,
}

/// 把实体记录转换为折线轮廓。
///
/// 每条记录独立产出一条自有的轮廓点集；POLYLINE/VERTEX/SEQEND 是唯一跨记录的状态，
/// 由内部的累积缓冲处理，SEQEND 时一次性输出。
#[derive(Debug, Default)]
pub struct Tessellator {
    units: UnitConversion,
    pending: Option<PendingPolyline>,
}

impl Tessellator {
    pub fn new(units: UnitConversion) -> Self {
        Self {
            units,
            pending: None,
        }
    }

    /// 处理一条记录。返回 `Ok(None)` 表示该记录本身不产生轮廓（POLYLINE、VERTEX）。
    pub fn tessellate(
        &mut self,
        record: &EntityRecord,
    ) -> Result<Option<Vec<Point2>>, TessellateError> {
        let kind = record.kind().ok_or(TessellateError::MissingKind)?;
        let fields = Fields { record, kind };

        match kind {
            "LINE" => Ok(Some(vec![
                self.point(&fields, 10, 20)?,
                self.point(&fields, 11, 21)?,
            ])),
            "CIRCLE" => {
                let center = self.point(&fields, 10, 20)?;
                let radius = self.radius(&fields)?;
                arc_points(&fields, center, radius, 0.0, 360.0).map(Some)
            }
            "ARC" => {
                let center = self.point(&fields, 10, 20)?;
                let radius = self.radius(&fields)?;
                let start = fields.float(50)?;
                let end = fields.float(51)?;
                let mut sweep = (end - start).rem_euclid(360.0);
                if sweep == 0.0 {
                    sweep = 360.0;
                }
                arc_points(&fields, center, radius, start, sweep).map(Some)
            }
            "LWPOLYLINE" => self.lwpolyline(&fields).map(Some),
            "POLYLINE" => {
                let closed = fields.optional_int(70)?.unwrap_or(0) & 1 != 0;
                self.pending = Some(PendingPolyline {
                    points: Vec::new(),
                    closed,
                });
                Ok(None)
            }
            "VERTEX" => {
                let point = self.point(&fields, 10, 20)?;
                self.pending.get_or_insert_with(PendingPolyline::default).points.push(point);
                Ok(None)
            }
            "SEQEND" => match self.pending.take() {
                Some(PendingPolyline { mut points, closed }) if !points.is_empty() => {
                    if closed {
                        points.push(points[0]);
                    }
                    Ok(Some(points))
                }
                _ => Ok(None),
            },
            "SPLINE" => self.spline(&fields).map(Some),
            other => Err(TessellateError::UnsupportedEntity {
                kind: other.to_string(),
            }),
        }
    }

    /// 结束一个形状；仍有未闭合的 POLYLINE 序列视为输入损坏。
    pub fn finish(self) -> Result<(), TessellateError> {
        match self.pending {
            Some(pending) => Err(TessellateError::UnterminatedPolyline(pending.points.len())),
            None => Ok(()),
        }
    }

    fn point(&self, fields: &Fields<'_>, x_code: i32, y_code: i32) -> Result<Point2, TessellateError> {
        Ok(self.units.point(fields.float(x_code)?, fields.float(y_code)?))
    }

    fn radius(&self, fields: &Fields<'_>) -> Result<f64, TessellateError> {
        let radius = fields.float(40)?;
        if radius < 0.0 {
            return Err(fields.invalid(format!("半径不能为负（{radius}）")));
        }
        Ok(self.units.length(radius))
    }

    fn lwpolyline(&self, fields: &Fields<'_>) -> Result<Vec<Point2>, TessellateError> {
        let count = fields.count(90)?;
        let xs = fields.floats(10, count)?;
        let ys = fields.floats(20, count)?;
        let mut points: Vec<Point2> = xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| self.units.point(x, y))
            .collect();
        let closed = fields.optional_int(70)?.unwrap_or(0) & 1 != 0;
        if closed && !points.is_empty() {
            points.push(points[0]);
        }
        Ok(points)
    }

    fn spline(&self, fields: &Fields<'_>) -> Result<Vec<Point2>, TessellateError> {
        let degree = fields.count(71)?;
        let knot_count = fields.count(72)?;
        let control_count = fields.count(73)?;

        let knots = fields.floats(40, knot_count)?;
        let xs = fields.floats(10, control_count)?;
        let ys = fields.floats(20, control_count)?;
        let control_points = xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| self.units.point(x, y))
            .collect();
        let weights = fields
            .record
            .values(41)
            .iter()
            .take(control_count)
            .map(|raw| fields.parse(41, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let curve = NurbsCurve::new(degree, knots, control_points, weights)?;
        Ok(curve.sample()?)
    }
}

/// 把一个形状的全部实体记录细分为几何数据。任一记录失败则整体失败，不返回部分结果。
pub fn tessellate_shape<'a, I>(
    records: I,
    units: UnitConversion,
) -> Result<ShapeGeometry, TessellateError>
where
    I: IntoIterator<Item = &'a EntityRecord>,
{
    let mut tessellator = Tessellator::new(units);
    let mut geometry = ShapeGeometry::new();
    let mut entity_count = 0usize;

    for record in records {
        entity_count += 1;
        if let Some(points) = tessellator.tessellate(record)? {
            geometry.push_contour(points);
        }
    }
    tessellator.finish()?;

    debug!(
        entity_count,
        contour_count = geometry.contours().len(),
        vertex_count = geometry.vertices().len(),
        "形状细分完成"
    );
    Ok(geometry)
}

/// 以等角步长采样圆弧，返回 `samples + 1` 个点。`sweep_deg` 为逆时针扫角。
fn arc_points(
    fields: &Fields<'_>,
    center: Point2,
    radius: f64,
    start_deg: f64,
    sweep_deg: f64,
) -> Result<Vec<Point2>, TessellateError> {
    let arc_length = (radius * sweep_deg.abs() * PI / 180.0).round();
    if !(arc_length <= MAX_SEGMENTS as f64) {
        return Err(fields.invalid(format!(
            "弧长 {arc_length} 超出采样上限 {MAX_SEGMENTS}"
        )));
    }
    let samples = (arc_length as usize).max(1);
    let step = sweep_deg / samples as f64;
    let points = (0..=samples)
        .map(|i| {
            let angle = (start_deg + step * i as f64).to_radians();
            Point2::new(
                center.x() + radius * angle.cos(),
                center.y() + radius * angle.sin(),
            )
        })
        .collect();
    Ok(points)
}

/// 带实体类型上下文的字段读取器，统一生成错误信息。
struct Fields<'a> {
    record: &'a EntityRecord,
    kind: &'a str,
}

impl Fields<'_> {
    fn parse(&self, code: i32, raw: &str) -> Result<f64, TessellateError> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| TessellateError::InvalidNumber {
                kind: self.kind.to_string(),
                code,
                value: raw.to_string(),
            })
    }

    fn raw(&self, code: i32) -> Result<&str, TessellateError> {
        self.record
            .first(code)
            .ok_or_else(|| TessellateError::MissingField {
                kind: self.kind.to_string(),
                code,
            })
    }

    fn float(&self, code: i32) -> Result<f64, TessellateError> {
        self.parse(code, self.raw(code)?)
    }

    /// 读取同一组码的前 `count` 个值；数量不足视为缺失字段。
    fn floats(&self, code: i32, count: usize) -> Result<Vec<f64>, TessellateError> {
        let values = self.record.values(code);
        if values.len() < count {
            return Err(self.invalid(format!(
                "组码 {code} 声明 {count} 个值，实际只有 {}",
                values.len()
            )));
        }
        values[..count]
            .iter()
            .map(|raw| self.parse(code, raw))
            .collect()
    }

    fn int(&self, code: i32, raw: &str) -> Result<i64, TessellateError> {
        raw.trim()
            .parse::<i64>()
            .map_err(|_| TessellateError::InvalidNumber {
                kind: self.kind.to_string(),
                code,
                value: raw.to_string(),
            })
    }

    fn optional_int(&self, code: i32) -> Result<Option<i64>, TessellateError> {
        self.record
            .first(code)
            .map(|raw| self.int(code, raw))
            .transpose()
    }

    fn count(&self, code: i32) -> Result<usize, TessellateError> {
        let raw = self.raw(code)?;
        let value = self.int(code, raw)?;
        usize::try_from(value).map_err(|_| TessellateError::InvalidNumber {
            kind: self.kind.to_string(),
            code,
            value: raw.to_string(),
        })
    }

    fn invalid(&self, message: String) -> TessellateError {
        TessellateError::Invalid {
            kind: self.kind.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> EntityRecord {
        EntityRecord::with_kind("LINE")
            .with(10, x1)
            .with(20, y1)
            .with(11, x2)
            .with(21, y2)
    }

    #[test]
    fn line_is_scaled_by_unit_conversion() {
        let mut tessellator = Tessellator::new(UnitConversion::from_units(Units::Inches));
        let points = tessellator
            .tessellate(&line(0.0, 0.0, 1.0, 2.0))
            .expect("line")
            .expect("contour");
        assert_eq!(points.len(), 2);
        assert!((points[1].x() - 25.4).abs() < 1e-9);
        assert!((points[1].y() - 50.8).abs() < 1e-9);
    }

    #[test]
    fn circle_sample_count_follows_circumference() {
        let mut tessellator = Tessellator::default();
        let circle = EntityRecord::with_kind("CIRCLE")
            .with(10, 0)
            .with(20, 0)
            .with(40, 10);
        let points = tessellator.tessellate(&circle).unwrap().unwrap();
        // round(10 * 2π) = 63 段
        assert_eq!(points.len(), 64);
        let first = points[0];
        let last = points[points.len() - 1];
        assert!(first.distance(last) < 1e-9);
    }

    #[test]
    fn tiny_radius_still_produces_a_segment() {
        let mut tessellator = Tessellator::default();
        let circle = EntityRecord::with_kind("CIRCLE")
            .with(10, 5)
            .with(20, 5)
            .with(40, 0.001);
        let points = tessellator.tessellate(&circle).unwrap().unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn oversized_circle_is_rejected_instead_of_sampled() {
        let mut tessellator = Tessellator::new(UnitConversion::from_units(Units::LightYears));
        let circle = EntityRecord::with_kind("CIRCLE")
            .with(10, 0)
            .with(20, 0)
            .with(40, 1);
        let err = tessellator.tessellate(&circle).unwrap_err();
        assert!(matches!(err, TessellateError::Invalid { ref kind, .. } if kind == "CIRCLE"));

        let mut tessellator = Tessellator::default();
        let arc = EntityRecord::with_kind("ARC")
            .with(10, 0)
            .with(20, 0)
            .with(40, 1e12)
            .with(50, 0)
            .with(51, 90);
        assert!(matches!(
            tessellator.tessellate(&arc),
            Err(TessellateError::Invalid { .. })
        ));
    }

    #[test]
    fn arc_wraps_counter_clockwise_through_zero() {
        let mut tessellator = Tessellator::default();
        let arc = EntityRecord::with_kind("ARC")
            .with(10, 0)
            .with(20, 0)
            .with(40, 10)
            .with(50, 270)
            .with(51, 90);
        let points = tessellator.tessellate(&arc).unwrap().unwrap();
        let first = points[0];
        let last = points[points.len() - 1];
        assert!(first.x().abs() < 1e-9 && (first.y() + 10.0).abs() < 1e-9);
        assert!(last.x().abs() < 1e-9 && (last.y() - 10.0).abs() < 1e-9);
        // 中点位于 0° 方向（右侧）。
        let mid = points[points.len() / 2];
        assert!(mid.x() > 9.0);
    }

    #[test]
    fn lwpolyline_reads_successive_vertices() {
        let mut tessellator = Tessellator::default();
        let record = EntityRecord::with_kind("LWPOLYLINE")
            .with(90, 3)
            .with(70, 1)
            .with(10, 0)
            .with(20, 0)
            .with(10, 4)
            .with(20, 0)
            .with(10, 4)
            .with(20, 3);
        let points = tessellator.tessellate(&record).unwrap().unwrap();
        assert_eq!(points.len(), 4);
        assert!((points[1].x() - 4.0).abs() < 1e-12);
        assert!((points[2].y() - 3.0).abs() < 1e-12);
        assert_eq!(points[3], points[0]);
    }

    #[test]
    fn lwpolyline_with_missing_vertices_is_rejected() {
        let mut tessellator = Tessellator::default();
        let record = EntityRecord::with_kind("LWPOLYLINE")
            .with(90, 2)
            .with(10, 0)
            .with(20, 0);
        let err = tessellator.tessellate(&record).unwrap_err();
        assert!(matches!(err, TessellateError::Invalid { ref kind, .. } if kind == "LWPOLYLINE"));
    }

    #[test]
    fn polyline_sequence_flushes_on_seqend() {
        let mut tessellator = Tessellator::default();
        assert!(tessellator
            .tessellate(&EntityRecord::with_kind("POLYLINE").with(70, 0))
            .unwrap()
            .is_none());
        for (x, y) in [(0, 0), (2, 0), (2, 2)] {
            let vertex = EntityRecord::with_kind("VERTEX").with(10, x).with(20, y);
            assert!(tessellator.tessellate(&vertex).unwrap().is_none());
        }
        let points = tessellator
            .tessellate(&EntityRecord::with_kind("SEQEND"))
            .unwrap()
            .expect("flushed contour");
        assert_eq!(points.len(), 3);
        assert!(tessellator
            .tessellate(&EntityRecord::with_kind("SEQEND"))
            .unwrap()
            .is_none());
        tessellator.finish().expect("no pending sequence");
    }

    #[test]
    fn unsupported_entity_aborts_whole_shape() {
        let records = vec![
            line(0.0, 0.0, 1.0, 0.0),
            EntityRecord::with_kind("TEXT").with(1, "hello"),
            line(1.0, 0.0, 1.0, 1.0),
        ];
        let err = tessellate_shape(&records, UnitConversion::identity()).unwrap_err();
        assert!(matches!(err, TessellateError::UnsupportedEntity { ref kind } if kind == "TEXT"));
        assert_eq!(err.to_string(), "unsupported geometry: entity TEXT");
    }

    #[test]
    fn malformed_number_is_fatal() {
        let record = EntityRecord::with_kind("LINE")
            .with(10, "abc")
            .with(20, 0)
            .with(11, 1)
            .with(21, 1);
        let err = tessellate_shape([&record], UnitConversion::identity()).unwrap_err();
        match err {
            TessellateError::InvalidNumber { kind, code, value } => {
                assert_eq!(kind, "LINE");
                assert_eq!(code, 10);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_fatal() {
        let record = EntityRecord::with_kind("CIRCLE").with(10, 0).with(20, 0);
        let err = tessellate_shape([&record], UnitConversion::identity()).unwrap_err();
        assert!(matches!(err, TessellateError::MissingField { code: 40, .. }));
    }

    #[test]
    fn unterminated_polyline_is_rejected() {
        let records = vec![
            EntityRecord::with_kind("POLYLINE"),
            EntityRecord::with_kind("VERTEX").with(10, 0).with(20, 0),
        ];
        let err = tessellate_shape(&records, UnitConversion::identity()).unwrap_err();
        assert!(matches!(err, TessellateError::UnterminatedPolyline(1)));
    }

    #[test]
    fn record_without_kind_is_rejected() {
        let record = EntityRecord::new().with(10, 0);
        let mut tessellator = Tessellator::default();
        assert!(matches!(
            tessellator.tessellate(&record),
            Err(TessellateError::MissingKind)
        ));
    }
}
