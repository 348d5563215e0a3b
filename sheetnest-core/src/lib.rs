pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。坐标单位由调用方决定（通常为毫米）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 轴对齐边界框，用于计算形状尺寸与栅格大小。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point2::from_vec(self.min.as_vec2().min(point.as_vec2()));
            self.max = Point2::from_vec(self.max.as_vec2().max(point.as_vec2()));
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 宽高；空边界框返回零向量。
        #[inline]
        pub fn size(&self) -> DVec2 {
            if self.is_empty() {
                DVec2::ZERO
            } else {
                self.max.as_vec2() - self.min.as_vec2()
            }
        }
    }
}

pub mod record {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    /// 实体类型所在的组码。
    pub const KIND_CODE: i32 = 0;

    /// 单个 CAD 实体的组码/值记录。
    ///
    /// 同一组码可以重复出现（例如样条的控制点坐标），因此每个组码对应一个按插入顺序
    /// 保存的值列表；同时记录全部 (组码, 值) 的原始顺序，以便还原为组码对列表。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(from = "Vec<(i32, String)>", into = "Vec<(i32, String)>")]
    pub struct EntityRecord {
        values: HashMap<i32, Vec<String>>,
        order: Vec<i32>,
    }

    impl EntityRecord {
        pub fn new() -> Self {
            Self::default()
        }

        /// 以实体类型（组码 0）开头创建记录。
        pub fn with_kind(kind: impl Into<String>) -> Self {
            let mut record = Self::new();
            record.push(KIND_CODE, kind);
            record
        }

        /// 追加一个组码/值对，保持同组码内的插入顺序。
        pub fn push(&mut self, code: i32, value: impl Into<String>) {
            self.values.entry(code).or_default().push(value.into());
            self.order.push(code);
        }

        /// 构造器风格的 `push`，便于测试与演示数据书写。
        pub fn with(mut self, code: i32, value: impl ToString) -> Self {
            self.push(code, value.to_string());
            self
        }

        /// 第一个组码 0 的值即实体类型。
        pub fn kind(&self) -> Option<&str> {
            self.first(KIND_CODE)
        }

        #[inline]
        pub fn values(&self, code: i32) -> &[String] {
            self.values.get(&code).map(Vec::as_slice).unwrap_or(&[])
        }

        #[inline]
        pub fn first(&self, code: i32) -> Option<&str> {
            self.values(code).first().map(String::as_str)
        }

        #[inline]
        pub fn contains(&self, code: i32) -> bool {
            self.values.contains_key(&code)
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.order.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.order.is_empty()
        }

        /// 按原始插入顺序遍历全部组码对。
        pub fn pairs(&self) -> impl Iterator<Item = (i32, &str)> + '_ {
            let mut cursor: HashMap<i32, usize> = HashMap::new();
            self.order.iter().filter_map(move |code| {
                let slot = cursor.entry(*code).or_insert(0);
                let value = self.values.get(code)?.get(*slot)?;
                *slot += 1;
                Some((*code, value.as_str()))
            })
        }
    }

    impl FromIterator<(i32, String)> for EntityRecord {
        fn from_iter<T: IntoIterator<Item = (i32, String)>>(iter: T) -> Self {
            let mut record = Self::new();
            for (code, value) in iter {
                record.push(code, value);
            }
            record
        }
    }

    impl From<Vec<(i32, String)>> for EntityRecord {
        fn from(pairs: Vec<(i32, String)>) -> Self {
            pairs.into_iter().collect()
        }
    }

    impl From<EntityRecord> for Vec<(i32, String)> {
        fn from(record: EntityRecord) -> Self {
            record
                .pairs()
                .map(|(code, value)| (code, value.to_string()))
                .collect()
        }
    }
}

pub mod shape {
    use std::ops::Range;

    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2};

    /// 顶点缓冲中的一条轮廓：起始顶点索引与顶点数量。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Contour {
        pub start: usize,
        pub count: usize,
    }

    impl Contour {
        #[inline]
        pub fn range(&self) -> Range<usize> {
            self.start..self.start + self.count
        }
    }

    /// 扁平的 (x, y, z) 顶点序列，z 恒为 0。构建期间只追加，构建完成后只读。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct VertexBuffer {
        vertices: Vec<DVec3>,
    }

    impl VertexBuffer {
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn push(&mut self, point: Point2) {
            self.vertices.push(DVec3::new(point.x(), point.y(), 0.0));
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.vertices.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.vertices.is_empty()
        }

        #[inline]
        pub fn as_slice(&self) -> &[DVec3] {
            &self.vertices
        }

        #[inline]
        pub fn point(&self, index: usize) -> Option<Point2> {
            self.vertices
                .get(index)
                .map(|v| Point2::new(v.x, v.y))
        }

        /// 导出为 GPU 友好的 `f32` 扁平数组（每个顶点三个分量）。
        pub fn to_f32_flat(&self) -> Vec<f32> {
            self.vertices
                .iter()
                .flat_map(|v| [v.x as f32, v.y as f32, v.z as f32])
                .collect()
        }
    }

    /// 形状的几何数据：共享顶点缓冲 + 轮廓索引。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ShapeGeometry {
        vertices: VertexBuffer,
        contours: Vec<Contour>,
    }

    impl ShapeGeometry {
        pub fn new() -> Self {
            Self::default()
        }

        /// 追加一条轮廓。空点集不会生成轮廓，返回 `None`。
        pub fn push_contour<I>(&mut self, points: I) -> Option<Contour>
        where
            I: IntoIterator<Item = Point2>,
        {
            let start = self.vertices.len();
            for point in points {
                self.vertices.push(point);
            }
            let count = self.vertices.len() - start;
            if count == 0 {
                return None;
            }
            let contour = Contour { start, count };
            self.contours.push(contour);
            Some(contour)
        }

        #[inline]
        pub fn vertices(&self) -> &VertexBuffer {
            &self.vertices
        }

        #[inline]
        pub fn contours(&self) -> &[Contour] {
            &self.contours
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.contours.is_empty()
        }

        pub fn contour_points(&self, contour: &Contour) -> impl Iterator<Item = Point2> + '_ {
            self.vertices.as_slice()[contour.range()]
                .iter()
                .map(|v| Point2::new(v.x, v.y))
        }

        /// 依次给出每条轮廓内相邻顶点构成的线段。
        pub fn segments(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
            self.contours.iter().flat_map(move |contour| {
                self.vertices.as_slice()[contour.range()]
                    .windows(2)
                    .map(|pair| {
                        (
                            Point2::new(pair[0].x, pair[0].y),
                            Point2::new(pair[1].x, pair[1].y),
                        )
                    })
            })
        }

        pub fn bounds(&self) -> Bounds2D {
            let mut bounds = Bounds2D::empty();
            for v in self.vertices.as_slice() {
                bounds.include_point(Point2::new(v.x, v.y));
            }
            bounds
        }

        #[inline]
        pub fn size(&self) -> DVec2 {
            self.bounds().size()
        }

        /// 平移几何，使最小角点落在原点。
        pub fn normalized(mut self) -> Self {
            let bounds = self.bounds();
            if bounds.is_empty() {
                return self;
            }
            let offset = bounds.min().as_vec2();
            for v in &mut self.vertices.vertices {
                v.x -= offset.x;
                v.y -= offset.y;
            }
            self
        }
    }
}

pub mod layout {
    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    /// 排样结果中的一个实例。追加到结果列表后不再修改，因此只暴露只读访问器。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LayoutEntry {
        key: String,
        position: Point2,
        mirrored: bool,
        scale: f64,
    }

    impl LayoutEntry {
        pub fn new(key: impl Into<String>, position: Point2, mirrored: bool, scale: f64) -> Self {
            Self {
                key: key.into(),
                position,
                mirrored,
                scale,
            }
        }

        #[inline]
        pub fn key(&self) -> &str {
            &self.key
        }

        /// 板材坐标（已包含间距偏移）。
        #[inline]
        pub fn position(&self) -> Point2 {
            self.position
        }

        #[inline]
        pub fn mirrored(&self) -> bool {
            self.mirrored
        }

        #[inline]
        pub fn scale(&self) -> f64 {
            self.scale
        }

        /// 将形状局部坐标映射到板材坐标。镜像为关于水平轴的翻转，
        /// `mirror_extent` 为缩放后占位栅格的高度跨度 `ceil(高度 * scale)`，
        /// 与排样时整行倒序的占位图保持一致。
        pub fn place_point(&self, local: Point2, mirror_extent: f64) -> Point2 {
            let scaled_y = local.y() * self.scale;
            let y = if self.mirrored {
                mirror_extent - scaled_y
            } else {
                scaled_y
            };
            Point2::new(
                local.x() * self.scale + self.position.x(),
                y + self.position.y(),
            )
        }
    }
}
