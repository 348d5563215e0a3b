pub mod grid;
pub mod hitmap;
pub mod packer;
pub mod rle;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    pub enum EngineError {
        #[error("shape `{0}` already exists")]
        DuplicateKey(String),
        #[error("shape `{0}` not found")]
        UnknownShape(String),
        #[error("shape `{0}` has no geometry")]
        EmptyShape(String),
        #[error("invalid display scale {scale} for shape `{key}`")]
        InvalidScale { key: String, scale: f64 },
    }
}

pub mod session {
    use glam::DVec2;
    use sheetnest_core::geometry::Point2;
    use sheetnest_core::layout::LayoutEntry;
    use sheetnest_core::shape::ShapeGeometry;
    use tracing::{debug, info};

    use crate::errors::EngineError;
    use crate::hitmap::HitmapBuilder;
    use crate::packer::{PackItem, Packer, SheetSpec};
    use crate::rle::RleGrid;

    /// 已登记的待排样形状。几何已平移到最小角点为原点。
    #[derive(Debug, Clone)]
    pub struct Shape {
        key: String,
        geometry: ShapeGeometry,
        size: DVec2,
        display_scale: f64,
        quantity: usize,
        mirror_eligible: bool,
    }

    impl Shape {
        fn new(key: String, geometry: ShapeGeometry) -> Self {
            let geometry = geometry.normalized();
            let size = geometry.size();
            Self {
                key,
                geometry,
                size,
                display_scale: 1.0,
                quantity: 1,
                mirror_eligible: true,
            }
        }

        #[inline]
        pub fn key(&self) -> &str {
            &self.key
        }

        #[inline]
        pub fn geometry(&self) -> &ShapeGeometry {
            &self.geometry
        }

        /// 未缩放的包围盒尺寸。
        #[inline]
        pub fn size(&self) -> DVec2 {
            self.size
        }

        #[inline]
        pub fn display_scale(&self) -> f64 {
            self.display_scale
        }

        #[inline]
        pub fn quantity(&self) -> usize {
            self.quantity
        }

        #[inline]
        pub fn mirror_eligible(&self) -> bool {
            self.mirror_eligible
        }

        /// 缩放后包围盒面积，决定排样顺序。
        pub fn display_area(&self) -> f64 {
            self.size.x * self.size.y * self.display_scale * self.display_scale
        }

        /// 镜像时的纵向翻转跨度：占位栅格高度减一，即 `ceil(高度 * scale)`。
        pub fn mirror_extent(&self) -> f64 {
            let (_, rows) = HitmapBuilder::new(self.display_scale).grid_size(&self.geometry);
            rows.saturating_sub(1) as f64
        }

        /// 按当前缩放与给定间距生成占位图。
        pub fn footprint(&self, spacing: usize) -> RleGrid {
            let grid = HitmapBuilder::new(self.display_scale)
                .spacing(spacing)
                .build(&self.geometry);
            RleGrid::encode(&grid)
        }
    }

    /// 维护形状列表（按显示面积降序）与最近一次排样结果。
    #[derive(Debug, Default)]
    pub struct NestingSession {
        shapes: Vec<Shape>,
        layout: Vec<LayoutEntry>,
    }

    impl NestingSession {
        pub fn new() -> Self {
            Self::default()
        }

        /// 登记新形状。面积相同或更大的新形状排在已有形状之前。
        pub fn add_shape(
            &mut self,
            key: impl Into<String>,
            geometry: ShapeGeometry,
        ) -> Result<&Shape, EngineError> {
            let key = key.into();
            if self.index_of(&key).is_some() {
                return Err(EngineError::DuplicateKey(key));
            }
            if geometry.is_empty() {
                return Err(EngineError::EmptyShape(key));
            }
            let shape = Shape::new(key, geometry);
            debug!(
                key = %shape.key,
                width = shape.size.x,
                height = shape.size.y,
                "登记形状"
            );
            let index = self.insert_sorted(shape);
            self.layout.clear();
            Ok(&self.shapes[index])
        }

        pub fn remove_shape(&mut self, key: &str) -> Result<Shape, EngineError> {
            let index = self.require(key)?;
            self.layout.clear();
            Ok(self.shapes.remove(index))
        }

        pub fn set_quantity(&mut self, key: &str, quantity: usize) -> Result<(), EngineError> {
            let index = self.require(key)?;
            self.shapes[index].quantity = quantity;
            self.layout.clear();
            Ok(())
        }

        /// 修改显示缩放后按新面积重新定位该形状。
        pub fn set_display_scale(&mut self, key: &str, scale: f64) -> Result<(), EngineError> {
            let index = self.require(key)?;
            if !scale.is_finite() || scale <= 0.0 {
                return Err(EngineError::InvalidScale {
                    key: key.to_string(),
                    scale,
                });
            }
            let mut shape = self.shapes.remove(index);
            shape.display_scale = scale;
            self.insert_sorted(shape);
            self.layout.clear();
            Ok(())
        }

        pub fn set_mirror_eligible(&mut self, key: &str, eligible: bool) -> Result<(), EngineError> {
            let index = self.require(key)?;
            self.shapes[index].mirror_eligible = eligible;
            self.layout.clear();
            Ok(())
        }

        #[inline]
        pub fn shapes(&self) -> &[Shape] {
            &self.shapes
        }

        pub fn shape(&self, key: &str) -> Option<&Shape> {
            self.shapes.iter().find(|shape| shape.key == key)
        }

        #[inline]
        pub fn layout(&self) -> &[LayoutEntry] {
            &self.layout
        }

        #[inline]
        pub fn clear_layout(&mut self) {
            self.layout.clear();
        }

        /// 所有形状数量之和。
        pub fn requested_instances(&self) -> usize {
            self.shapes.iter().map(|shape| shape.quantity).sum()
        }

        /// 重新生成全部占位图并在空白板材上排样。
        pub fn pack(&mut self, spec: &SheetSpec) -> &[LayoutEntry] {
            let items: Vec<PackItem> = self
                .shapes
                .iter()
                .filter(|shape| shape.quantity > 0)
                .map(|shape| PackItem {
                    key: shape.key.clone(),
                    quantity: shape.quantity,
                    scale: shape.display_scale,
                    mirror_eligible: shape.mirror_eligible,
                    footprint: shape.footprint(spec.spacing),
                })
                .collect();

            self.layout = Packer::new(*spec).pack(&items);

            let requested = self.requested_instances();
            info!(
                requested,
                placed = self.layout.len(),
                dropped = requested - self.layout.len(),
                sheet_width = spec.width,
                sheet_height = spec.height,
                "排样完成"
            );
            &self.layout
        }

        /// 把每个已放置实例的轮廓变换到板材坐标，合并为一份几何数据供外部绘制。
        pub fn placed_contours(&self) -> ShapeGeometry {
            let mut placed = ShapeGeometry::new();
            for entry in &self.layout {
                let Some(shape) = self.shape(entry.key()) else {
                    continue;
                };
                let extent = shape.mirror_extent();
                for contour in shape.geometry.contours() {
                    let points: Vec<Point2> = shape
                        .geometry
                        .contour_points(contour)
                        .map(|point| entry.place_point(point, extent))
                        .collect();
                    placed.push_contour(points);
                }
            }
            placed
        }

        fn index_of(&self, key: &str) -> Option<usize> {
            self.shapes.iter().position(|shape| shape.key == key)
        }

        fn require(&self, key: &str) -> Result<usize, EngineError> {
            self.index_of(key)
                .ok_or_else(|| EngineError::UnknownShape(key.to_string()))
        }

        fn insert_sorted(&mut self, shape: Shape) -> usize {
            let area = shape.display_area();
            let index = self
                .shapes
                .iter()
                .position(|existing| existing.display_area() <= area)
                .unwrap_or(self.shapes.len());
            self.shapes.insert(index, shape);
            index
        }
    }

}
